//! Shared fixtures for the coordinator integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ferry_meta::InMemoryMetadataStore;
use ferry_store::{
    ComposeSource, ContainerInfo, Fingerprint, InMemoryObjectStore, ObjectInfo, ObjectStore,
    StoreResult,
};
use ferry_upload::{PartSubmission, UploadConfig, UploadCoordinator};

pub const CONTAINER: &str = "uploads";

/// Object store wrapper that counts calls and can misbehave on request.
pub struct StubStore {
    inner: InMemoryObjectStore,
    pub puts: AtomicUsize,
    pub composes: AtomicUsize,
    compose_delay: Duration,
    /// Names left out of every listing, simulating writes that never land.
    hidden: HashSet<String>,
    /// Part rewritten with different bytes right before the next compose.
    tamper: Option<String>,
    tampered: AtomicBool,
}

impl StubStore {
    pub fn new() -> Self {
        Self::wrapping(InMemoryObjectStore::new())
    }

    pub fn wrapping(inner: InMemoryObjectStore) -> Self {
        Self {
            inner,
            puts: AtomicUsize::new(0),
            composes: AtomicUsize::new(0),
            compose_delay: Duration::ZERO,
            hidden: HashSet::new(),
            tamper: None,
            tampered: AtomicBool::new(false),
        }
    }

    pub fn with_compose_delay(mut self, delay: Duration) -> Self {
        self.compose_delay = delay;
        self
    }

    pub fn hiding(mut self, name: impl Into<String>) -> Self {
        self.hidden.insert(name.into());
        self
    }

    pub fn tampering_with(mut self, name: impl Into<String>) -> Self {
        self.tamper = Some(name.into());
        self
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn composes(&self) -> usize {
        self.composes.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryObjectStore {
        &self.inner
    }
}

#[async_trait]
impl ObjectStore for StubStore {
    fn backend_name(&self) -> &'static str {
        "stub"
    }

    async fn create_container(&self, container: &str) -> StoreResult<()> {
        self.inner.create_container(container).await
    }

    async fn delete_container(&self, container: &str) -> StoreResult<()> {
        self.inner.delete_container(container).await
    }

    async fn container_exists(&self, container: &str) -> StoreResult<bool> {
        self.inner.container_exists(container).await
    }

    async fn list_containers(&self) -> StoreResult<Vec<ContainerInfo>> {
        self.inner.list_containers().await
    }

    async fn put(&self, container: &str, name: &str, data: Bytes) -> StoreResult<Fingerprint> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(container, name, data).await
    }

    async fn get(&self, container: &str, name: &str) -> StoreResult<Bytes> {
        self.inner.get(container, name).await
    }

    async fn get_if_match(
        &self,
        container: &str,
        name: &str,
        expected: &Fingerprint,
    ) -> StoreResult<Bytes> {
        self.inner.get_if_match(container, name, expected).await
    }

    async fn stat(&self, container: &str, name: &str) -> StoreResult<Option<ObjectInfo>> {
        self.inner.stat(container, name).await
    }

    async fn list(&self, container: &str, prefix: &str) -> StoreResult<Vec<ObjectInfo>> {
        let mut objects = self.inner.list(container, prefix).await?;
        objects.retain(|info| !self.hidden.contains(&info.name));
        Ok(objects)
    }

    async fn compose(
        &self,
        container: &str,
        dest: &str,
        sources: &[ComposeSource],
    ) -> StoreResult<Fingerprint> {
        self.composes.fetch_add(1, Ordering::SeqCst);
        if !self.compose_delay.is_zero() {
            tokio::time::sleep(self.compose_delay).await;
        }
        if let Some(name) = &self.tamper {
            if !self.tampered.swap(true, Ordering::SeqCst) {
                self.inner
                    .put(container, name, Bytes::from_static(b"tampered!"))
                    .await?;
            }
        }
        self.inner.compose(container, dest, sources).await
    }

    async fn delete(&self, container: &str, names: &[String]) -> StoreResult<()> {
        self.inner.delete(container, names).await
    }
}

/// A valid 32-hex-digit identifier derived from `n`.
pub fn identifier(n: u64) -> String {
    format!("{n:032x}")
}

/// Content of part `index`: distinct, and of varying length so that any
/// ordering mistake changes the assembled bytes.
pub fn part_data(index: u32) -> Bytes {
    Bytes::from(format!("<{index}>"))
}

pub fn expected_content(total_parts: u32) -> Bytes {
    let joined: String = (1..=total_parts).map(|i| format!("<{i}>")).collect();
    Bytes::from(joined)
}

pub fn total_size(total_parts: u32) -> u64 {
    expected_content(total_parts).len() as u64
}

pub const PART_SIZE: u64 = 4;

pub fn submission(id: &str, index: u32, total_parts: u32, name: &str) -> PartSubmission {
    PartSubmission::new(part_data(index))
        .identifier(id)
        .part_size(PART_SIZE)
        .part(index, total_parts)
        .total_size(total_size(total_parts))
        .target(CONTAINER, name)
}

pub fn part_name(id: &str, index: u32) -> String {
    format!("{id}_{PART_SIZE}/{index}.part")
}

/// A coordinator over `store` with a fresh metadata store and an existing
/// upload container.
pub async fn coordinator(store: Arc<StubStore>, config: UploadConfig) -> UploadCoordinator {
    store.create_container(CONTAINER).await.unwrap();
    UploadCoordinator::new(store, Arc::new(InMemoryMetadataStore::new()), config)
}
