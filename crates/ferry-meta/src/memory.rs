//! In-memory metadata store for testing and ephemeral use.
//!
//! [`InMemoryMetadataStore`] keeps plain keys and hash tables in `BTreeMap`s
//! protected by a `RwLock`. Data is lost when the store is dropped.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MetaError, Result};
use crate::traits::MetadataStore;

/// Plain keys plus hash tables. Shared with the file backend, which persists
/// this struct as JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
    #[serde(default)]
    pub tables: BTreeMap<String, BTreeMap<String, String>>,
}

impl Snapshot {
    pub fn hash_get(&self, table: &str, field: &str) -> Option<String> {
        self.tables.get(table).and_then(|t| t.get(field)).cloned()
    }

    pub fn hash_set(&mut self, table: &str, field: &str, value: &str) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    pub fn hash_delete(&mut self, table: &str, field: &str) -> bool {
        let Some(fields) = self.tables.get_mut(table) else {
            return false;
        };
        let removed = fields.remove(field).is_some();
        if fields.is_empty() {
            self.tables.remove(table);
        }
        removed
    }
}

pub(crate) fn poisoned<E: std::fmt::Display>(e: E) -> MetaError {
    MetaError::Backend(format!("lock poisoned: {e}"))
}

/// An in-memory implementation of [`MetadataStore`].
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    inner: RwLock<Snapshot>,
}

impl InMemoryMetadataStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plain keys currently stored.
    pub fn key_count(&self) -> usize {
        self.inner.read().map(|s| s.keys.len()).unwrap_or(0)
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.keys.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.keys.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        Ok(inner.keys.remove(key).is_some())
    }

    async fn hash_get(&self, table: &str, field: &str) -> Result<Option<String>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.hash_get(table, field))
    }

    async fn hash_set(&self, table: &str, field: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.hash_set(table, field, value);
        Ok(())
    }

    async fn hash_delete(&self, table: &str, field: &str) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        Ok(inner.hash_delete(table, field))
    }
}
