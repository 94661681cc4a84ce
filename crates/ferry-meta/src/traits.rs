//! The [`MetadataStore`] trait.
//!
//! Any backend (in-memory, file, Redis) implements this trait. Plain keys and
//! hash tables live in separate namespaces, as in Redis.

use async_trait::async_trait;

use crate::error::Result;

/// Small persistent key-value and hash-field store.
///
/// Implementations must be thread-safe (`Send + Sync`) and make each single
/// operation atomic.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Short backend identifier for logs.
    fn backend_name(&self) -> &'static str;

    /// Read a plain key. Returns `Ok(None)` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a plain key, replacing any existing value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Check whether a plain key exists.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Delete a plain key. Returns `true` if it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Read one field of a hash table. Returns `Ok(None)` if absent.
    async fn hash_get(&self, table: &str, field: &str) -> Result<Option<String>>;

    /// Write one field of a hash table.
    async fn hash_set(&self, table: &str, field: &str, value: &str) -> Result<()>;

    /// Delete one field of a hash table. Returns `true` if it existed.
    async fn hash_delete(&self, table: &str, field: &str) -> Result<bool>;
}
