//! Metadata store boundary for ferry.
//!
//! Durable cross-process state lives in a small key-value store with
//! per-table hash fields, modelled on Redis. The coordinator only ever uses
//! it through the typed [`DedupIndex`].
//!
//! # Modules
//!
//! - [`error`] -- Error types for metadata operations
//! - [`traits`] -- The [`MetadataStore`] trait
//! - [`memory`] -- In-memory [`InMemoryMetadataStore`] for tests
//! - [`file`] -- JSON snapshot [`FileMetadataStore`] for single-node deployments
//! - [`dedup`] -- [`DedupIndex`], the identifier and location lookups
//! - `redis` -- [`RedisMetadataStore`] (cargo feature `redis`)

pub mod dedup;
pub mod error;
pub mod file;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
pub mod traits;

pub use dedup::DedupIndex;
pub use error::{MetaError, Result};
pub use file::FileMetadataStore;
pub use memory::InMemoryMetadataStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisMetadataStore;
pub use traits::MetadataStore;
