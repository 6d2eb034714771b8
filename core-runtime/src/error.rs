use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task '{0}' was cancelled")]
    Cancelled(String),

    #[error("Task '{task}' panicked: {message}")]
    TaskPanicked { task: String, message: String },

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns `true` when a preemptive task was superseded or aborted.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
