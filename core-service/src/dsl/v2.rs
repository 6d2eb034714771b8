//! Shell-like request lines: `cmd args... [--opt[=val]...] [<<WORD]`.
//!
//! Quoting and escaping follow POSIX shell rules (`shlex`).

use super::RawRequest;
use crate::error::{Result, ServiceError};

pub fn parse(line: &str) -> Result<RawRequest> {
    let mut argv = shlex::split(line)
        .ok_or_else(|| ServiceError::syntax("unknown tokens: unclosed quote or trailing escape"))?;

    let heredoc_word = match argv.last().map(String::as_str) {
        Some("<<") => {
            return Err(ServiceError::syntax("no heredoc word"));
        }
        Some(last) if last.starts_with("<<") => {
            let word = last.trim_start_matches("<<").to_string();
            argv.pop();
            Some(word)
        }
        Some(last) if argv.len() >= 2 && argv[argv.len() - 2] == "<<" => {
            let word = last.to_string();
            argv.truncate(argv.len() - 2);
            Some(word)
        }
        _ => None,
    };

    if argv.iter().any(|a| a.starts_with("<<")) {
        return Err(ServiceError::syntax("unknown tokens: heredoc must end the line"));
    }
    if argv.is_empty() {
        return Err(ServiceError::syntax("empty request"));
    }
    Ok(RawRequest { argv, heredoc_word })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quotes_and_escapes() {
        let raw = parse(r#"search "晴天 周杰伦" --source='local' it\'s"#).unwrap();
        assert_eq!(raw.argv, ["search", "晴天 周杰伦", "--source=local", "it's"]);
        assert_eq!(raw.heredoc_word, None);
    }

    #[test]
    fn test_heredoc_word() {
        assert_eq!(
            parse("jsonrpc <<EOF").unwrap().heredoc_word.as_deref(),
            Some("EOF")
        );
        let raw = parse("exec << END").unwrap();
        assert_eq!(raw.argv, ["exec"]);
        assert_eq!(raw.heredoc_word.as_deref(), Some("END"));
    }

    #[test]
    fn test_errors() {
        assert!(parse("exec <<").is_err());
        assert!(parse("search 'unclosed").is_err());
        assert!(parse("exec <<EOF more").is_err());
    }
}
