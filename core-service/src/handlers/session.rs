//! Commands acting on the session itself: `set`, `help`, `sub`.

use tracing::info;

use super::Context;
use crate::dsl::help_text;
use crate::error::{Result, ServiceError};
use crate::protocol::ProtocolVersion;
use crate::serializers::Output;

pub fn set(
    ctx: &Context<'_>,
    rpc_version: Option<&str>,
    pubsub_version: Option<&str>,
) -> Result<Output> {
    // Validate both before changing anything.
    let rpc_version = rpc_version.map(str::parse::<ProtocolVersion>).transpose()?;
    let pubsub_version = pubsub_version
        .map(str::parse::<ProtocolVersion>)
        .transpose()?;
    if let Some(version) = rpc_version {
        ctx.session.set_rpc_version(version);
    }
    if let Some(version) = pubsub_version {
        ctx.session.set_pubsub_version(version);
    }
    Ok(Output::Empty)
}

pub fn help(cmd: Option<&str>) -> Result<Output> {
    help_text(cmd).map(Output::Text)
}

/// Link the session to every topic matching one of `patterns`.
pub fn sub(ctx: &Context<'_>, patterns: &[String]) -> Result<Output> {
    let gateway = &ctx.app.gateway;
    let subscriber = ctx.session.subscriber();
    let mut linked = Vec::new();
    for pattern in patterns {
        let topics = gateway.link_matching(pattern, &subscriber)?;
        if topics.is_empty() {
            return Err(ServiceError::handler(format!(
                "no topic matches '{pattern}'"
            )));
        }
        linked.extend(topics);
    }
    info!(session = ctx.session.id(), topics = ?linked, "Session subscribed");
    Ok(Output::Empty)
}
