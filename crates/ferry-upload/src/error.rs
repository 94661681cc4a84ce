use ferry_meta::MetaError;
use ferry_store::StoreError;
use ferry_types::{ContentId, Location};
use thiserror::Error;

/// Errors surfaced by [`UploadCoordinator`](crate::UploadCoordinator).
#[derive(Debug, Error)]
pub enum UploadError {
    /// Missing or malformed submission fields. Nothing was mutated.
    #[error("invalid submission: {0}")]
    Validation(String),

    /// The target container does not exist.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The requested name is held by different content and no usable
    /// disambiguated name is free.
    #[error("target {location} is already held by content {existing}")]
    TargetConflict {
        location: Location,
        existing: ContentId,
    },

    /// A single backend call failed. Resubmitting may succeed.
    #[error("object store error: {0}")]
    Backend(#[from] StoreError),

    /// The part was written but never showed up in the listing.
    #[error("part {index} did not land after {attempts} attempt(s)")]
    PartUploadFailed { index: u32, attempts: u32 },

    /// A source part changed between listing and assembly.
    #[error("part {index} ({name}) changed during assembly")]
    MergeConflict { index: u32, name: String },

    /// Assembly failed for a reason other than a conflict.
    #[error("assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetaError),
}

impl UploadError {
    /// Whether resubmitting the same part may succeed without the caller
    /// changing anything.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend(e) => !matches!(
                e,
                StoreError::ContainerNotFound(_) | StoreError::InvalidKey(_)
            ),
            Self::MergeConflict { .. } | Self::AssemblyFailed(_) => true,
            Self::Metadata(e) => matches!(e, MetaError::Backend(_) | MetaError::Io(_)),
            Self::Validation(_)
            | Self::ContainerNotFound(_)
            | Self::TargetConflict { .. }
            | Self::PartUploadFailed { .. } => false,
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;
