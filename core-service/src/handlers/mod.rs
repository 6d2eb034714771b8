//! Request handlers.
//!
//! Each command is handled by a function of one of the submodules, which
//! returns an [`Output`]. [`handle_request`] dispatches on the command,
//! serializes the output with the requested format and turns failures into
//! `Oops` responses:
//!
//! - syntax errors become `bad request!` followed by the diagnostic
//! - handler errors and user-facing library errors are sent as is
//! - anything else is logged and reported as an internal server error
//!
//! A failing request never closes the session.

mod methods;
mod player;
mod playlist;
mod search;
mod session;
mod show;
mod status;

pub use methods::{MethodRegistry, JSONRPC_INVALID_PARAMS, JSONRPC_METHOD_NOT_FOUND};
pub use player::keyword_score;

use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::app::App;
use crate::dsl::{Command, Request};
use crate::error::{Result, ServiceError};
use crate::protocol::Response;
use crate::serializers::{self, Output};
use crate::session::Session;

/// What a handler sees of the server.
pub struct Context<'a> {
    pub app: &'a Arc<App>,
    pub session: &'a Session,
}

#[instrument(skip_all, fields(session = session.id(), cmd = request.command.name()))]
pub async fn handle_request(app: &Arc<App>, session: &Session, request: Request) -> Response {
    let ctx = Context { app, session };
    let format = request.format;
    let result = dispatch(&ctx, request.command)
        .await
        .and_then(|output| serializers::serialize(format, &output));
    match result {
        Ok(body) => {
            debug!(len = body.len(), "Request handled");
            Response::ok(body)
        }
        Err(err) => error_response(err),
    }
}

/// Map a failed request to the response the client reads.
pub fn error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::FuoSyntax(diagnostic) => Response::bad_request(&diagnostic),
        err if err.is_user_facing() => Response::oops(err.to_string()),
        err => {
            error!(error = ?err, "Handler failed");
            Response::oops(format!("internal server error\n{err:?}"))
        }
    }
}

async fn dispatch(ctx: &Context<'_>, command: Command) -> Result<Output> {
    let app = ctx.app;
    match command {
        Command::Status => Ok(status::status(app)),
        Command::Play { target } => player::play(app, &target.join(" ")).await,
        Command::Pause => player::pause(app),
        Command::Resume => player::resume(app),
        Command::Toggle => player::toggle(app),
        Command::Stop => player::stop(app),
        Command::Next => playlist::next(app).await,
        Command::Previous => playlist::previous(app).await,
        Command::Search {
            keyword,
            sources,
            types,
        } => search::search(app, &keyword.join(" "), &sources, &types).await,
        Command::Show { uri } => show::show(ctx, uri.as_deref().unwrap_or("fuo://")).await,
        Command::List => Ok(playlist::list(app)),
        Command::Clear => Ok(playlist::clear(app)),
        Command::Add { uris } => playlist::add(app, &uris).await,
        Command::Remove { uri } => playlist::remove(app, &uri),
        Command::Exec { code } => methods::exec(app, code.as_deref().unwrap_or_default()).await,
        Command::Jsonrpc { body } => {
            methods::jsonrpc(app, body.as_deref().unwrap_or_default()).await
        }
        Command::Set {
            rpc_version,
            pubsub_version,
        } => session::set(ctx, rpc_version.as_deref(), pubsub_version.as_deref()),
        Command::Help { cmd } => session::help(cmd.as_deref()),
        Command::Sub { topics } => session::sub(ctx, &topics),
        // The server closes the connection before dispatching.
        Command::Quit => Ok(Output::Empty),
    }
}
