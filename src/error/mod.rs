//! Error types and handlers for registry operations

pub mod handlers;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Registry answered with a non-success status
    #[error("{context} failed: HTTP {status} - {body}")]
    Transport {
        context: String,
        status: u16,
        body: String,
    },
    /// Connection, TLS or timeout failure before any status was received
    #[error("Network error: {message}")]
    Network { message: String, timed_out: bool },
    /// Well-formed response that lacks what the protocol requires
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// Manifest absent at the given reference
    #[error("Not found: {repository}:{reference}")]
    NotFound {
        repository: String,
        reference: String,
    },
    /// A token was presented for an operation it does not cover
    #[error("Authorization error: {0}")]
    Authorization(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl RegistryError {
    pub fn not_found(repository: &str, reference: &str) -> Self {
        RegistryError::NotFound {
            repository: repository.to_string(),
            reference: reference.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }

    /// HTTP status carried by the error, if the registry answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            RegistryError::Transport { status, .. } => Some(*status),
            RegistryError::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RegistryError::Network { .. } => true,
            RegistryError::Transport { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for RegistryError {
    fn from(err: url::ParseError) -> Self {
        RegistryError::Validation(err.to_string())
    }
}
