//! # Service Error Types
//!
//! Errors raised while reading, parsing and handling fuo requests.
//!
//! Only a few of them reach the client verbatim: syntax errors become a
//! `bad request!` response, handler errors and user-facing library errors
//! become the body of an `Oops` response. Everything else is reported as an
//! internal server error and logged.

use core_library::LibraryError;
use core_playback::PlaybackError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request line does not follow the request grammar.
    #[error("{0}")]
    FuoSyntax(String),

    /// A command failed in a way the client should read about.
    #[error("{0}")]
    Handler(String),

    /// Binding or serving a socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// Unexpected failure inside a handler.
    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn handler(message: impl Into<String>) -> Self {
        ServiceError::Handler(message.into())
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        ServiceError::FuoSyntax(message.into())
    }

    /// Whether the error text is meant for the client as is.
    ///
    /// Registry and resolver errors are reported to the user; provider I/O
    /// failures, engine failures and the like are internal.
    pub fn is_user_facing(&self) -> bool {
        match self {
            ServiceError::FuoSyntax(_) | ServiceError::Handler(_) => true,
            ServiceError::Library(err) => !matches!(
                err,
                LibraryError::ProviderIo { .. } | LibraryError::Bridge(_)
            ),
            ServiceError::Playback(PlaybackError::Library(err)) => !err.is_provider_io(),
            ServiceError::Playback(
                PlaybackError::NotASong(_) | PlaybackError::InvalidState(_),
            ) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(ServiceError::handler("nope").is_user_facing());
        assert!(ServiceError::from(LibraryError::ProviderNotFound("x".into())).is_user_facing());
        assert!(!ServiceError::from(LibraryError::ProviderIo {
            provider: "x".into(),
            message: "timeout".into(),
        })
        .is_user_facing());
        assert!(!ServiceError::from(anyhow::anyhow!("boom")).is_user_facing());
        assert!(
            ServiceError::from(PlaybackError::InvalidState("fm".into())).is_user_facing()
        );
    }
}
