use core_library::SearchType;
use futures::StreamExt;
use std::sync::Arc;
use tracing::instrument;

use crate::app::App;
use crate::error::Result;
use crate::serializers::Output;

/// `--source a,b -s c` -> `[a, b, c]`
fn split_values(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Search every provider, or the given ones, concurrently. Failing
/// providers are skipped so the result may be partial.
#[instrument(skip(app))]
pub async fn search(
    app: &Arc<App>,
    keyword: &str,
    sources: &[String],
    types: &[String],
) -> Result<Output> {
    let sources = split_values(sources);
    let mut type_in = Vec::new();
    for t in split_values(types) {
        for t in SearchType::parse_list(&t)? {
            if !type_in.contains(&t) {
                type_in.push(t);
            }
        }
    }
    if type_in.is_empty() {
        type_in.push(SearchType::Song);
    }

    let source_in = (!sources.is_empty()).then_some(sources.as_slice());
    let results: Vec<_> = app
        .library
        .a_search(keyword, &type_in, source_in, None)
        .filter(|result| futures::future::ready(!result.is_empty()))
        .collect()
        .await;
    Ok(Output::Search(results))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_values() {
        let values = vec!["a,b".to_string(), " c ".to_string(), ",".to_string()];
        assert_eq!(split_values(&values), ["a", "b", "c"]);
    }
}
