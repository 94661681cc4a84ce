use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::traits::{
    check_compose_limits, ComposeSource, ContainerInfo, Fingerprint, ObjectInfo, ObjectStore,
};

#[derive(Clone)]
struct StoredBlob {
    data: Bytes,
    info: ObjectInfo,
}

struct Container {
    created_at: DateTime<Utc>,
    objects: BTreeMap<String, StoredBlob>,
}

/// In-memory, map-based object store.
///
/// Intended for tests and embedding. All containers are held behind a single
/// `RwLock`; object content is shared via [`Bytes`] so reads never copy.
///
/// Compose limits can be tightened with [`Self::with_compose_limits`] to
/// behave like S3-compatible backends that reject small sources.
pub struct InMemoryObjectStore {
    containers: RwLock<BTreeMap<String, Container>>,
    min_compose_sources: usize,
    min_compose_part_size: u64,
}

impl InMemoryObjectStore {
    /// Create a new empty store with no compose limits.
    pub fn new() -> Self {
        Self {
            containers: RwLock::new(BTreeMap::new()),
            min_compose_sources: 1,
            min_compose_part_size: 0,
        }
    }

    /// Require at least `min_sources` sources per compose and at least
    /// `min_part_size` bytes for every source but the last.
    pub fn with_compose_limits(mut self, min_sources: usize, min_part_size: u64) -> Self {
        self.min_compose_sources = min_sources.max(1);
        self.min_compose_part_size = min_part_size;
        self
    }

    /// Number of objects across all containers.
    pub fn object_count(&self) -> usize {
        self.containers
            .read()
            .expect("lock poisoned")
            .values()
            .map(|c| c.objects.len())
            .sum()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.containers
            .read()
            .expect("lock poisoned")
            .values()
            .flat_map(|c| c.objects.values())
            .map(|blob| blob.info.size)
            .sum()
    }

    fn write_blob(container: &mut Container, name: &str, data: Bytes) -> Fingerprint {
        let fingerprint = Fingerprint::of(&data);
        let info = ObjectInfo {
            name: name.to_string(),
            fingerprint: fingerprint.clone(),
            size: data.len() as u64,
            last_modified: Utc::now(),
        };
        container
            .objects
            .insert(name.to_string(), StoredBlob { data, info });
        fingerprint
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create_container(&self, container: &str) -> StoreResult<()> {
        let mut map = self.containers.write().expect("lock poisoned");
        if map.contains_key(container) {
            return Err(StoreError::ContainerExists(container.to_string()));
        }
        map.insert(
            container.to_string(),
            Container {
                created_at: Utc::now(),
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> StoreResult<()> {
        let mut map = self.containers.write().expect("lock poisoned");
        match map.get(container) {
            None => Err(StoreError::ContainerNotFound(container.to_string())),
            Some(c) if !c.objects.is_empty() => {
                Err(StoreError::ContainerNotEmpty(container.to_string()))
            }
            Some(_) => {
                map.remove(container);
                Ok(())
            }
        }
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        Ok(self
            .containers
            .read()
            .expect("lock poisoned")
            .contains_key(container))
    }

    async fn list_containers(&self) -> StoreResult<Vec<ContainerInfo>> {
        let map = self.containers.read().expect("lock poisoned");
        Ok(map
            .iter()
            .map(|(name, c)| ContainerInfo {
                name: name.clone(),
                created_at: c.created_at,
            })
            .collect())
    }

    async fn put(&self, container: &str, name: &str, data: Bytes) -> StoreResult<Fingerprint> {
        let mut map = self.containers.write().expect("lock poisoned");
        let c = map
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        Ok(Self::write_blob(c, name, data))
    }

    async fn get(&self, container: &str, name: &str) -> StoreResult<Bytes> {
        let map = self.containers.read().expect("lock poisoned");
        let c = map
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        c.objects
            .get(name)
            .map(|blob| blob.data.clone())
            .ok_or_else(|| StoreError::not_found(container, name))
    }

    async fn get_if_match(
        &self,
        container: &str,
        name: &str,
        expected: &Fingerprint,
    ) -> StoreResult<Bytes> {
        let map = self.containers.read().expect("lock poisoned");
        let c = map
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        match c.objects.get(name) {
            Some(blob) if blob.info.fingerprint == *expected => Ok(blob.data.clone()),
            other => Err(StoreError::PreconditionFailed {
                name: name.to_string(),
                expected: expected.clone(),
                actual: other.map(|blob| blob.info.fingerprint.clone()),
            }),
        }
    }

    async fn stat(&self, container: &str, name: &str) -> StoreResult<Option<ObjectInfo>> {
        let map = self.containers.read().expect("lock poisoned");
        let c = map
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        Ok(c.objects.get(name).map(|blob| blob.info.clone()))
    }

    async fn list(&self, container: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let map = self.containers.read().expect("lock poisoned");
        let c = map
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        Ok(c.objects
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(_, blob)| blob.info.clone())
            .collect())
    }

    async fn compose(
        &self,
        container: &str,
        dest: &str,
        sources: &[ComposeSource],
    ) -> StoreResult<Fingerprint> {
        let mut map = self.containers.write().expect("lock poisoned");
        let c = map
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;

        let mut blobs = Vec::with_capacity(sources.len());
        for source in sources {
            match c.objects.get(&source.name) {
                Some(blob) if blob.info.fingerprint == source.fingerprint => blobs.push(blob),
                other => {
                    return Err(StoreError::PreconditionFailed {
                        name: source.name.clone(),
                        expected: source.fingerprint.clone(),
                        actual: other.map(|blob| blob.info.fingerprint.clone()),
                    })
                }
            }
        }
        let sizes: Vec<u64> = blobs.iter().map(|blob| blob.info.size).collect();
        check_compose_limits(&sizes, self.min_compose_sources, self.min_compose_part_size)?;

        let mut buf = BytesMut::with_capacity(sizes.iter().sum::<u64>() as usize);
        for blob in blobs {
            buf.extend_from_slice(&blob.data);
        }
        Ok(Self::write_blob(c, dest, buf.freeze()))
    }

    async fn delete(&self, container: &str, names: &[String]) -> StoreResult<()> {
        let mut map = self.containers.write().expect("lock poisoned");
        let c = map
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        for name in names {
            c.objects.remove(name);
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.object_count())
            .field("min_compose_part_size", &self.min_compose_part_size)
            .finish()
    }
}
