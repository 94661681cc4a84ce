//! Object storage boundary for ferry.
//!
//! The upload coordinator never talks to a concrete blob store. It drives an
//! [`ObjectStore`]: durable blobs addressed by `(container, name)` with
//! put/get/list/delete and an atomic multi-source [`ObjectStore::compose`].
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//! - [`FilesystemObjectStore`] -- one directory per container under a root
//!
//! # Design Rules
//!
//! 1. Every stored object carries a [`Fingerprint`] that plays the role of an
//!    ETag and changes whenever the object is rewritten.
//! 2. `compose` checks every source fingerprint before writing and fails with
//!    [`StoreError::PreconditionFailed`] on mismatch.
//! 3. A backend that cannot compose the given sources reports
//!    [`StoreError::ComposeUnsupported`] instead of partially writing.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod filesystem;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use filesystem::FilesystemObjectStore;
pub use memory::InMemoryObjectStore;
pub use traits::{ComposeSource, ContainerInfo, Fingerprint, ObjectInfo, ObjectStore};
