//! Foundation types for ferry.
//!
//! This crate provides the identity, naming, and status types shared by every
//! other ferry crate. It has no I/O of its own.
//!
//! # Key Types
//!
//! - [`ContentId`] -- Validated caller-supplied content hash (e.g. MD5 hex)
//! - [`SessionKey`] -- `(ContentId, part size)` pair identifying one resumable upload
//! - [`Location`] -- Final `(container, name)` address of an assembled object
//! - [`DedupRecord`] -- Persisted proof that content already has a final location
//! - [`SessionStatus`] -- Result of submitting one part

pub mod error;
pub mod identity;
pub mod location;
pub mod names;
pub mod session;
pub mod status;

pub use error::TypeError;
pub use identity::ContentId;
pub use location::{DedupRecord, Location};
pub use names::{validate_container_name, validate_object_name};
pub use session::{parse_part_index, sort_parts_by_index, SessionKey, PART_SUFFIX};
pub use status::{SessionProgress, SessionStatus, UploadOutcome};
