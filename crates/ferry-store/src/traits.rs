use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Content fingerprint of a stored object (ETag equivalent).
///
/// [`Fingerprint::of`] is the hex BLAKE3 digest of the object's bytes. Backends
/// may derive it from metadata instead, as long as every rewrite of an object
/// yields a new value.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of the given content.
    pub fn of(data: &[u8]) -> Self {
        Self(blake3::hash(data).to_hex().to_string())
    }

    /// Wrap a fingerprint reported by a backend.
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.0[..self.0.len().min(12)])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata of one stored object, as returned by `list` and `stat`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub fingerprint: Fingerprint,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Metadata of one container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One source of a compose request: the object name plus the fingerprint
/// observed when the source was listed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposeSource {
    pub name: String,
    pub fingerprint: Fingerprint,
}

impl ComposeSource {
    pub fn new(name: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            name: name.into(),
            fingerprint,
        }
    }
}

/// Durable blob storage addressed by `(container, name)`.
///
/// Implementations must be safe to call concurrently. Writes to different
/// names never block each other on the caller's side.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend identifier for logs and `/v1/info`.
    fn backend_name(&self) -> &'static str;

    /// Create a container. Fails with `ContainerExists` if present.
    async fn create_container(&self, container: &str) -> StoreResult<()>;

    /// Remove an empty container.
    async fn delete_container(&self, container: &str) -> StoreResult<()>;

    /// Check whether a container exists.
    async fn container_exists(&self, container: &str) -> StoreResult<bool>;

    /// List all containers, sorted by name.
    async fn list_containers(&self) -> StoreResult<Vec<ContainerInfo>>;

    /// Write an object, replacing any previous content, and return its
    /// fingerprint.
    async fn put(&self, container: &str, name: &str, data: Bytes) -> StoreResult<Fingerprint>;

    /// Write an object from the content of a local file.
    ///
    /// The default implementation reads the file into memory and calls
    /// `put`; backends that can copy from disk should override it.
    async fn put_file(&self, container: &str, name: &str, source: &Path) -> StoreResult<Fingerprint> {
        let data = tokio::fs::read(source).await?;
        self.put(container, name, Bytes::from(data)).await
    }

    /// Read an object's full content.
    async fn get(&self, container: &str, name: &str) -> StoreResult<Bytes>;

    /// Read an object only if its fingerprint still matches `expected`.
    ///
    /// The default implementation stats and then reads; backends that can do
    /// both under one lock should override it.
    async fn get_if_match(
        &self,
        container: &str,
        name: &str,
        expected: &Fingerprint,
    ) -> StoreResult<Bytes> {
        let actual = self.stat(container, name).await?.map(|info| info.fingerprint);
        if actual.as_ref() != Some(expected) {
            return Err(StoreError::PreconditionFailed {
                name: name.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
        self.get(container, name).await
    }

    /// Metadata of one object, or `None` if it does not exist.
    async fn stat(&self, container: &str, name: &str) -> StoreResult<Option<ObjectInfo>>;

    /// List objects whose names start with `prefix`, sorted by name.
    async fn list(&self, container: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>>;

    /// Atomically concatenate `sources`, in the given order, into `dest`.
    ///
    /// Every source must still carry its supplied fingerprint, otherwise the
    /// call fails with `PreconditionFailed` and `dest` is left untouched.
    async fn compose(
        &self,
        container: &str,
        dest: &str,
        sources: &[ComposeSource],
    ) -> StoreResult<Fingerprint>;

    /// Delete the named objects. Names that do not exist are ignored.
    async fn delete(&self, container: &str, names: &[String]) -> StoreResult<()>;
}

/// Check S3-style compose limits: at least `min_sources` sources and every
/// source but the last at least `min_part_size` bytes.
pub(crate) fn check_compose_limits(
    sizes: &[u64],
    min_sources: usize,
    min_part_size: u64,
) -> StoreResult<()> {
    if sizes.len() < min_sources {
        return Err(StoreError::ComposeUnsupported(format!(
            "{} source(s) given, backend requires at least {min_sources}",
            sizes.len()
        )));
    }
    if let Some((position, size)) = sizes
        .iter()
        .take(sizes.len().saturating_sub(1))
        .enumerate()
        .find(|(_, size)| **size < min_part_size)
    {
        return Err(StoreError::ComposeUnsupported(format!(
            "source {} is {size} bytes, backend requires at least {min_part_size}",
            position + 1
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_content_derived() {
        assert_eq!(Fingerprint::of(b"abc"), Fingerprint::of(b"abc"));
        assert_ne!(Fingerprint::of(b"abc"), Fingerprint::of(b"abd"));
        assert_eq!(Fingerprint::of(b"").as_str().len(), 64);
    }

    #[test]
    fn compose_limits() {
        assert!(check_compose_limits(&[10, 10, 1], 1, 10).is_ok());
        assert!(check_compose_limits(&[1], 1, 10).is_ok()); // last part may be small
        assert!(matches!(
            check_compose_limits(&[9, 10], 1, 10),
            Err(StoreError::ComposeUnsupported(_))
        ));
        assert!(matches!(
            check_compose_limits(&[10], 2, 0),
            Err(StoreError::ComposeUnsupported(_))
        ));
    }
}
