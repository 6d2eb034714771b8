use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LibraryError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("Provider already exists: {0}")]
    ProviderAlreadyExists(String),

    #[error("Model not found: {uri} ({reason})")]
    ModelNotFound { uri: String, reason: String },

    #[error("Media not found: {0}")]
    MediaNotFound(String),

    #[error("Provider '{provider}' does not support {operation}")]
    NotSupported { provider: String, operation: String },

    #[error("No user logged in to provider '{0}'")]
    NoUserLoggedIn(String),

    /// Network or transport failure reported by a provider. Transient, the
    /// same request may succeed later.
    #[error("Provider '{provider}' I/O error: {message}")]
    ProviderIo { provider: String, message: String },

    #[error("Cannot resolve '{0}'")]
    ResolveFailed(String),

    #[error("Invalid select policy: {0}")]
    InvalidPolicy(String),

    #[error("Bridge error: {0}")]
    Bridge(String),
}

impl LibraryError {
    pub fn not_supported(provider: &str, operation: &str) -> Self {
        LibraryError::NotSupported {
            provider: provider.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn model_not_found(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        LibraryError::ModelNotFound {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn is_media_not_found(&self) -> bool {
        matches!(self, LibraryError::MediaNotFound(_))
    }

    pub fn is_provider_io(&self) -> bool {
        matches!(self, LibraryError::ProviderIo { .. })
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, LibraryError::NotSupported { .. })
    }

    pub fn is_model_not_found(&self) -> bool {
        matches!(self, LibraryError::ModelNotFound { .. })
    }
}

impl From<BridgeError> for LibraryError {
    fn from(err: BridgeError) -> Self {
        LibraryError::Bridge(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
