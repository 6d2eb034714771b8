//! Named server-side methods reachable from `exec` and `jsonrpc`.
//!
//! The registry is fixed at compile time; an unknown method name is
//! rejected before anything runs. Methods take positional JSON arguments and
//! return a JSON value.
//!
//! ```text
//! exec <<EOF
//! playlist.add "fuo://local/songs/1"
//! player.set_volume 50
//! EOF
//! ```

use core_library::models::Model;
use core_library::{uri, LibraryError, SearchType};
use core_playback::{PlaybackError, PlaybackMode};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde_json::{json, Deserializer, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, instrument, warn};

use super::status;
use crate::app::App;
use crate::error::{Result, ServiceError};
use crate::serializers::json::model_json;
use crate::serializers::{Output, ProviderInfo};

pub const JSONRPC_PARSE_ERROR: i64 = -32700;
pub const JSONRPC_INVALID_REQUEST: i64 = -32600;
pub const JSONRPC_METHOD_NOT_FOUND: i64 = -32601;
pub const JSONRPC_INVALID_PARAMS: i64 = -32602;
pub const JSONRPC_INTERNAL_ERROR: i64 = -32603;

#[derive(Debug)]
pub enum MethodError {
    InvalidParams(String),
    Failed(ServiceError),
}

impl From<ServiceError> for MethodError {
    fn from(err: ServiceError) -> Self {
        MethodError::Failed(err)
    }
}

impl From<PlaybackError> for MethodError {
    fn from(err: PlaybackError) -> Self {
        MethodError::Failed(err.into())
    }
}

impl From<LibraryError> for MethodError {
    fn from(err: LibraryError) -> Self {
        MethodError::Failed(err.into())
    }
}

impl From<MethodError> for ServiceError {
    fn from(err: MethodError) -> Self {
        match err {
            MethodError::InvalidParams(message) => ServiceError::Handler(message),
            MethodError::Failed(err) => err,
        }
    }
}

type MethodResult = std::result::Result<Value, MethodError>;
type Method = fn(Arc<App>, Vec<Value>) -> BoxFuture<'static, MethodResult>;

/// Positional arguments of one call.
struct Params {
    method: &'static str,
    values: std::vec::IntoIter<Value>,
}

impl Params {
    fn new(method: &'static str, values: Vec<Value>) -> Self {
        Self {
            method,
            values: values.into_iter(),
        }
    }

    fn invalid(&self, what: &str) -> MethodError {
        MethodError::InvalidParams(format!("{}: {what}", self.method))
    }

    fn string(&mut self, name: &str) -> std::result::Result<String, MethodError> {
        match self.values.next() {
            Some(Value::String(s)) => Ok(s),
            _ => Err(self.invalid(&format!("expect string argument '{name}'"))),
        }
    }

    fn number(&mut self, name: &str) -> std::result::Result<f64, MethodError> {
        match self.values.next().as_ref().and_then(Value::as_f64) {
            Some(n) => Ok(n),
            None => Err(self.invalid(&format!("expect number argument '{name}'"))),
        }
    }

    fn optional_string(&mut self) -> Option<String> {
        match self.values.next() {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    fn done(&mut self) -> std::result::Result<(), MethodError> {
        match self.values.next() {
            None => Ok(()),
            Some(_) => Err(self.invalid("too many arguments")),
        }
    }
}

fn song_of(line: &str) -> std::result::Result<Model, MethodError> {
    let model = uri::parse_brief_line(line)?;
    if model.as_brief_song().is_none() {
        return Err(MethodError::InvalidParams(format!("not a song: {line}")));
    }
    Ok(model)
}

pub struct MethodRegistry {
    methods: BTreeMap<&'static str, Method>,
}

impl MethodRegistry {
    fn new() -> Self {
        let mut methods: BTreeMap<&'static str, Method> = BTreeMap::new();

        methods.insert("app.status", |app, values| {
            async move {
                Params::new("app.status", values).done()?;
                let report = status::report(&app);
                let text = crate::serializers::json::render(&Output::Status(report))?;
                Ok(serde_json::from_str(&text).map_err(ServiceError::from)?)
            }
            .boxed()
        });

        methods.insert("player.pause", |app, values| {
            async move {
                Params::new("player.pause", values).done()?;
                app.player.pause()?;
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("player.resume", |app, values| {
            async move {
                Params::new("player.resume", values).done()?;
                app.player.resume()?;
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("player.toggle", |app, values| {
            async move {
                Params::new("player.toggle", values).done()?;
                app.player.toggle()?;
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("player.stop", |app, values| {
            async move {
                Params::new("player.stop", values).done()?;
                app.player.stop()?;
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("player.play_url", |app, values| {
            async move {
                let mut params = Params::new("player.play_url", values);
                let url = params.string("url")?;
                params.done()?;
                app.player.play(bridge_traits::Media::new(url), false)?;
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("player.set_volume", |app, values| {
            async move {
                let mut params = Params::new("player.set_volume", values);
                let volume = params.number("volume")?;
                params.done()?;
                app.player.set_volume(volume as i64)?;
                Ok(Value::from(app.player.volume()))
            }
            .boxed()
        });
        methods.insert("player.seek", |app, values| {
            async move {
                let mut params = Params::new("player.seek", values);
                let position = params.number("position")?;
                params.done()?;
                app.player.seek(position)?;
                Ok(Value::Null)
            }
            .boxed()
        });

        methods.insert("playlist.list", |app, values| {
            async move {
                Params::new("playlist.list", values).done()?;
                let uris: Vec<String> = app
                    .playlist
                    .list()
                    .iter()
                    .map(core_library::models::ModelIdentity::uri)
                    .collect();
                Ok(json!(uris))
            }
            .boxed()
        });
        methods.insert("playlist.clear", |app, values| {
            async move {
                Params::new("playlist.clear", values).done()?;
                app.playlist.clear();
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("playlist.add", |app, values| {
            async move {
                let mut params = Params::new("playlist.add", values);
                let line = params.string("uri")?;
                params.done()?;
                if let Some(song) = song_of(&line)?.as_brief_song() {
                    app.playlist.add(song);
                }
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("playlist.remove", |app, values| {
            async move {
                let mut params = Params::new("playlist.remove", values);
                let line = params.string("uri")?;
                params.done()?;
                if let Some(song) = song_of(&line)?.as_brief_song() {
                    app.playlist.remove(&song);
                }
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("playlist.play_model", |app, values| {
            async move {
                let mut params = Params::new("playlist.play_model", values);
                let line = params.string("uri")?;
                params.done()?;
                app.playlist.play_model(song_of(&line)?).await?;
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("playlist.next", |app, values| {
            async move {
                Params::new("playlist.next", values).done()?;
                super::playlist::next(&app).await?;
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("playlist.previous", |app, values| {
            async move {
                Params::new("playlist.previous", values).done()?;
                super::playlist::previous(&app).await?;
                Ok(Value::Null)
            }
            .boxed()
        });
        methods.insert("playlist.playback_mode", |app, values| {
            async move {
                Params::new("playlist.playback_mode", values).done()?;
                Ok(Value::from(app.playlist.playback_mode().as_str()))
            }
            .boxed()
        });
        methods.insert("playlist.set_playback_mode", |app, values| {
            async move {
                let mut params = Params::new("playlist.set_playback_mode", values);
                let mode = params.string("mode")?;
                params.done()?;
                let mode: PlaybackMode = mode
                    .parse()
                    .map_err(|_| params.invalid(&format!("unknown playback mode '{mode}'")))?;
                app.playlist.set_playback_mode(mode)?;
                Ok(Value::Null)
            }
            .boxed()
        });

        methods.insert("library.list_providers", |app, values| {
            async move {
                Params::new("library.list_providers", values).done()?;
                let providers: Vec<Value> = app
                    .library
                    .list()
                    .iter()
                    .map(|p| {
                        let info = ProviderInfo::of(p.as_ref());
                        json!({ "identifier": info.identifier, "name": info.name })
                    })
                    .collect();
                Ok(Value::Array(providers))
            }
            .boxed()
        });
        methods.insert("library.search", |app, values| {
            async move {
                let mut params = Params::new("library.search", values);
                let keyword = params.string("keyword")?;
                let types = params.optional_string().unwrap_or_default();
                params.done()?;
                let mut type_in = SearchType::parse_list(&types)?;
                if type_in.is_empty() {
                    type_in.push(SearchType::Song);
                }
                let results: Vec<_> = app
                    .library
                    .a_search(&keyword, &type_in, None, None)
                    .collect()
                    .await;
                let text = crate::serializers::json::render(&Output::Search(results))?;
                Ok(serde_json::from_str(&text).map_err(ServiceError::from)?)
            }
            .boxed()
        });
        methods.insert("library.model_get", |app, values| {
            async move {
                let mut params = Params::new("library.model_get", values);
                let line = params.string("uri")?;
                params.done()?;
                let parsed = uri::parse(&line)?;
                let key = parsed.key;
                let model = app
                    .library
                    .model_get(&key.source, key.model_type, &key.identifier)
                    .await?;
                Ok(model_json(&model)?)
            }
            .boxed()
        });

        Self { methods }
    }

    /// The registry shared by every session.
    pub fn global() -> &'static MethodRegistry {
        static REGISTRY: OnceLock<MethodRegistry> = OnceLock::new();
        REGISTRY.get_or_init(MethodRegistry::new)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Run `name`. `None` when no such method exists.
    pub async fn call(&self, app: &Arc<App>, name: &str, params: Vec<Value>) -> Option<MethodResult> {
        let method = self.methods.get(name)?;
        debug!(method = name, "Calling method");
        Some(method(Arc::clone(app), params).await)
    }
}

/// Split `method [json args...]`.
fn parse_exec_line(line: &str) -> Result<(&str, Vec<Value>)> {
    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest),
        None => (line, ""),
    };
    let args = Deserializer::from_str(rest)
        .into_iter::<Value>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|err| ServiceError::handler(format!("invalid arguments of {name}: {err}")))?;
    Ok((name, args))
}

/// Run one method call per non-empty line, stopping at the first failure.
/// Returns the non-null results, one per line.
#[instrument(skip(app, code))]
pub async fn exec(app: &Arc<App>, code: &str) -> Result<Output> {
    let registry = MethodRegistry::global();
    let mut outputs = Vec::new();
    for line in code.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, args) = parse_exec_line(line)?;
        let value = registry
            .call(app, name, args)
            .await
            .ok_or_else(|| ServiceError::handler(format!("method '{name}' not found")))??;
        if !value.is_null() {
            outputs.push(serde_json::to_string(&value)?);
        }
    }
    Ok(Output::Text(outputs.join("\n")))
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": { "code": code, "message": message.into() },
        "id": id,
    })
}

/// Answer one request object. `None` for notifications.
async fn handle_rpc_call(app: &Arc<App>, call: Value) -> Option<Value> {
    let Value::Object(call) = call else {
        return Some(rpc_error(Value::Null, JSONRPC_INVALID_REQUEST, "Invalid Request"));
    };
    let id = call.get("id").cloned();
    let reply_id = id.clone().unwrap_or(Value::Null);

    let version_ok = call.get("jsonrpc").and_then(Value::as_str) == Some("2.0");
    let Some(name) = call.get("method").and_then(Value::as_str).filter(|_| version_ok) else {
        return Some(rpc_error(reply_id, JSONRPC_INVALID_REQUEST, "Invalid Request"));
    };
    let params = match call.get("params") {
        None => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            return id.map(|id| rpc_error(id, JSONRPC_INVALID_PARAMS, "params must be an array"));
        }
    };

    let registry = MethodRegistry::global();
    let response = match registry.call(app, name, params).await {
        None => rpc_error(reply_id, JSONRPC_METHOD_NOT_FOUND, "Method not found"),
        Some(Ok(result)) => json!({ "jsonrpc": "2.0", "result": result, "id": reply_id }),
        Some(Err(MethodError::InvalidParams(message))) => {
            rpc_error(reply_id, JSONRPC_INVALID_PARAMS, message)
        }
        Some(Err(MethodError::Failed(err))) => {
            if err.is_user_facing() {
                warn!(method = name, error = %err, "Method failed");
            } else {
                error!(method = name, error = ?err, "Method failed");
            }
            rpc_error(reply_id, JSONRPC_INTERNAL_ERROR, err.to_string())
        }
    };
    id.map(|_| response)
}

/// Handle a JSON-RPC 2.0 request or batch.
#[instrument(skip(app, body))]
pub async fn jsonrpc(app: &Arc<App>, body: &str) -> Result<Output> {
    let request: Value = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "Invalid JSON-RPC body");
            return Ok(Output::Json(rpc_error(
                Value::Null,
                JSONRPC_PARSE_ERROR,
                "Parse error",
            )));
        }
    };

    match request {
        Value::Array(calls) if calls.is_empty() => Ok(Output::Json(rpc_error(
            Value::Null,
            JSONRPC_INVALID_REQUEST,
            "Invalid Request",
        ))),
        Value::Array(calls) => {
            let mut responses = Vec::with_capacity(calls.len());
            for call in calls {
                responses.extend(handle_rpc_call(app, call).await);
            }
            if responses.is_empty() {
                Ok(Output::Empty)
            } else {
                Ok(Output::Json(Value::Array(responses)))
            }
        }
        call => Ok(handle_rpc_call(app, call)
            .await
            .map(Output::Json)
            .unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exec_line() {
        let (name, args) = parse_exec_line(r#"player.set_volume 50"#).unwrap();
        assert_eq!(name, "player.set_volume");
        assert_eq!(args, vec![json!(50)]);

        let (name, args) = parse_exec_line(r#"library.search "blue sky" "so,al""#).unwrap();
        assert_eq!(name, "library.search");
        assert_eq!(args, vec![json!("blue sky"), json!("so,al")]);

        let (_, args) = parse_exec_line("player.pause").unwrap();
        assert!(args.is_empty());
        assert!(parse_exec_line("player.seek {").is_err());
    }

    #[test]
    fn test_registry_is_fixed() {
        let registry = MethodRegistry::global();
        assert!(registry.contains("app.status"));
        assert!(registry.contains("playlist.set_playback_mode"));
        assert!(!registry.contains("__import__"));
        assert!(registry.names().all(|n| n.contains('.')));
    }

    #[test]
    fn test_params() {
        let mut params = Params::new("x", vec![json!("a"), json!(1.5)]);
        assert_eq!(params.string("s").unwrap(), "a");
        assert_eq!(params.number("n").unwrap(), 1.5);
        assert!(params.done().is_ok());

        let mut params = Params::new("x", vec![json!(1)]);
        assert!(matches!(params.string("s"), Err(MethodError::InvalidParams(_))));
    }
}
