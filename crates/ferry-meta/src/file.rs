//! File-backed metadata store for single-node deployments.
//!
//! The whole dataset is a JSON [`Snapshot`] held in memory and rewritten to
//! disk after every mutation. Writes go to a temporary file in the same
//! directory which is then atomically renamed over the target, so a crash
//! never leaves a half-written snapshot behind.
//!
//! Mutations are serialized by an async writer lock and the disk write runs
//! on the blocking pool. Readers only contend with the final in-memory swap.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{MetaError, Result};
use crate::memory::{poisoned, Snapshot};
use crate::traits::MetadataStore;

/// A [`MetadataStore`] persisted as a single JSON file.
#[derive(Debug)]
pub struct FileMetadataStore {
    path: Arc<PathBuf>,
    inner: RwLock<Snapshot>,
    writer: Mutex<()>,
}

impl FileMetadataStore {
    /// Open the store at `path`, loading the existing snapshot if present.
    ///
    /// Parent directories are created as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let snapshot = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| MetaError::Corrupt {
                key: path.display().to_string(),
                reason: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = snapshot.keys.len(), "metadata snapshot loaded");
        Ok(Self {
            path: Arc::new(path),
            inner: RwLock::new(snapshot),
            writer: Mutex::new(()),
        })
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Apply `mutate` and persist the result. The in-memory state is only
    /// replaced once the write succeeded.
    async fn mutate<T>(&self, mutate: impl FnOnce(&mut Snapshot) -> T) -> Result<T> {
        let _writer = self.writer.lock().await;
        let current = self.inner.read().map_err(poisoned)?.clone();
        let mut next = current.clone();
        let out = mutate(&mut next);
        if next == current {
            return Ok(out);
        }

        let json = serde_json::to_vec_pretty(&next)
            .map_err(|e| MetaError::Serialization(e.to_string()))?;
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || persist(&path, &json))
            .await
            .map_err(|e| MetaError::Backend(format!("snapshot write task failed: {e}")))??;

        *self.inner.write().map_err(poisoned)? = next;
        Ok(out)
    }
}

fn persist(path: &Path, json: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| MetaError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.keys.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.mutate(|s| {
            s.keys.insert(key.to_string(), value.to_string());
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.mutate(|s| s.keys.remove(key).is_some()).await
    }

    async fn hash_get(&self, table: &str, field: &str) -> Result<Option<String>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.hash_get(table, field))
    }

    async fn hash_set(&self, table: &str, field: &str, value: &str) -> Result<()> {
        self.mutate(|s| s.hash_set(table, field, value)).await
    }

    async fn hash_delete(&self, table: &str, field: &str) -> Result<bool> {
        self.mutate(|s| s.hash_delete(table, field)).await
    }
}
