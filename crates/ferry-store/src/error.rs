use crate::traits::Fingerprint;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested container does not exist.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The container already exists.
    #[error("container already exists: {0}")]
    ContainerExists(String),

    /// The container still holds objects and cannot be removed.
    #[error("container not empty: {0}")]
    ContainerNotEmpty(String),

    /// The requested object was not found.
    #[error("object not found: {container}/{name}")]
    NotFound { container: String, name: String },

    /// An object's current fingerprint differs from the expected one.
    #[error("precondition failed for {name}: expected {expected}, found {}", .actual.as_ref().map(|f| f.as_str()).unwrap_or("<missing>"))]
    PreconditionFailed {
        name: String,
        expected: Fingerprint,
        actual: Option<Fingerprint>,
    },

    /// The backend cannot compose the given sources (too few or too small).
    #[error("compose unsupported: {0}")]
    ComposeUnsupported(String),

    /// A container or object name is unusable as a storage path.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(container: &str, name: &str) -> Self {
        Self::NotFound {
            container: container.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns `true` for errors that name a missing object or container.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::ContainerNotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
