use thiserror::Error;

/// Errors produced by type construction and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: String },

    #[error("invalid part size: {0}")]
    InvalidPartSize(u64),

    #[error("invalid container name {name:?}: {reason}")]
    InvalidContainerName { name: String, reason: String },

    #[error("invalid object name {name:?}: {reason}")]
    InvalidObjectName { name: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
