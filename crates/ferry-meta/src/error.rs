//! Error types for metadata operations.

use thiserror::Error;

/// Errors that can occur during metadata operations.
#[derive(Debug, Error)]
pub enum MetaError {
    /// A stored value could not be decoded.
    #[error("corrupt metadata at {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The backend could not be reached or rejected the command.
    #[error("metadata backend error: {0}")]
    Backend(String),

    /// I/O error during file-based operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for metadata operations.
pub type Result<T> = std::result::Result<T, MetaError>;
