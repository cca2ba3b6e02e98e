use dataseal_types::{DataSealError, ErrorCategory};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors surfaced by the protocol facade
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A component rejected the transaction; nothing was changed
    #[error(transparent)]
    Rejected(#[from] DataSealError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProtocolError::Rejected(err) => err.category(),
            ProtocolError::Config(_) | ProtocolError::Io(_) => ErrorCategory::Internal,
        }
    }

    /// The component error, if this is a rejection
    pub fn rejection(&self) -> Option<&DataSealError> {
        match self {
            ProtocolError::Rejected(err) => Some(err),
            _ => None,
        }
    }
}
