//! Upload coordinator for ferry.
//!
//! Drives one part submission at a time through dedup lookup, part write,
//! authoritative re-listing, completion detection, merge admission and
//! assembly. All durable truth lives in the [`ObjectStore`] and the
//! [`MetadataStore`]; the in-process [`PartTracker`] and [`MergeGate`] only
//! avoid redundant work and duplicate merges.
//!
//! [`ObjectStore`]: ferry_store::ObjectStore
//! [`MetadataStore`]: ferry_meta::MetadataStore
//! [`PartTracker`]: ferry_gate::PartTracker
//! [`MergeGate`]: ferry_gate::MergeGate

pub mod assembly;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod request;

pub use assembly::{assemble, Assembled, AssemblyPart, AssemblyStrategy};
pub use config::UploadConfig;
pub use coordinator::UploadCoordinator;
pub use error::{UploadError, UploadResult};
pub use request::{PartSubmission, ValidatedSubmission};
