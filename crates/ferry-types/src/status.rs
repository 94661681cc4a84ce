use serde::{Deserialize, Serialize};

use crate::location::Location;

/// How a part submission ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The content already had a final location; nothing was written.
    Deduplicated,
    /// This submission completed the session and assembled the final object.
    Assembled,
    /// More parts are still missing.
    InProgress,
    /// The session is complete but another submission is assembling it.
    Merging,
}

/// Parts present in the backend at the time of the authoritative listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub uploaded_parts: u32,
    pub uploaded_bytes: u64,
    pub total_parts: u32,
    pub total_size: u64,
}

impl SessionProgress {
    /// Complete iff both the part count and the byte total match the
    /// declared totals. The byte check catches a truncated part.
    pub fn is_complete(&self) -> bool {
        self.uploaded_parts == self.total_parts && self.uploaded_bytes == self.total_size
    }
}

/// Result of submitting one part.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub complete: bool,
    pub merging: bool,
    pub outcome: UploadOutcome,
    pub location: Option<Location>,
    pub progress: SessionProgress,
}

impl SessionStatus {
    pub fn deduplicated(location: Location) -> Self {
        Self {
            complete: true,
            merging: false,
            outcome: UploadOutcome::Deduplicated,
            location: Some(location),
            progress: SessionProgress::default(),
        }
    }

    pub fn assembled(location: Location, progress: SessionProgress) -> Self {
        Self {
            complete: true,
            merging: false,
            outcome: UploadOutcome::Assembled,
            location: Some(location),
            progress,
        }
    }

    pub fn in_progress(progress: SessionProgress) -> Self {
        Self {
            complete: false,
            merging: false,
            outcome: UploadOutcome::InProgress,
            location: None,
            progress,
        }
    }

    pub fn merging(progress: SessionProgress) -> Self {
        Self {
            complete: false,
            merging: true,
            outcome: UploadOutcome::Merging,
            location: None,
            progress,
        }
    }
}
