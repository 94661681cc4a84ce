use std::sync::Arc;

use ferry_meta::{FileMetadataStore, InMemoryMetadataStore, MetadataStore};
use ferry_store::{FilesystemObjectStore, InMemoryObjectStore, ObjectStore};
use ferry_upload::UploadCoordinator;
use tracing::info;

use crate::config::{FerryConfig, MetadataBackend, StorageBackend};
use crate::error::{ServerError, ServerResult};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<UploadCoordinator>,
}

impl AppState {
    pub fn new(coordinator: Arc<UploadCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Build the backends named in `config` and a coordinator over them.
    pub async fn from_config(config: &FerryConfig) -> ServerResult<Self> {
        let store = open_object_store(config).await?;
        let meta = open_metadata_store(config).await?;
        info!(
            storage = store.backend_name(),
            metadata = meta.backend_name(),
            "backends ready"
        );
        let coordinator = UploadCoordinator::new(store, meta, config.upload.clone());
        Ok(Self::new(Arc::new(coordinator)))
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        self.coordinator.store()
    }
}

pub async fn open_object_store(config: &FerryConfig) -> ServerResult<Arc<dyn ObjectStore>> {
    Ok(match config.storage.backend {
        StorageBackend::Memory => Arc::new(InMemoryObjectStore::new()),
        StorageBackend::Filesystem => {
            Arc::new(FilesystemObjectStore::new(&config.storage.root).await?)
        }
    })
}

pub async fn open_metadata_store(config: &FerryConfig) -> ServerResult<Arc<dyn MetadataStore>> {
    Ok(match config.metadata.backend {
        MetadataBackend::Memory => Arc::new(InMemoryMetadataStore::new()),
        MetadataBackend::File => Arc::new(FileMetadataStore::open(&config.metadata.path)?),
        MetadataBackend::Redis => open_redis(config).await?,
    })
}

#[cfg(feature = "redis")]
async fn open_redis(config: &FerryConfig) -> ServerResult<Arc<dyn MetadataStore>> {
    let url = config
        .metadata
        .url
        .as_deref()
        .ok_or_else(|| ServerError::Config("metadata.url is required for the redis backend".into()))?;
    Ok(Arc::new(ferry_meta::RedisMetadataStore::connect(url).await?))
}

#[cfg(not(feature = "redis"))]
async fn open_redis(_config: &FerryConfig) -> ServerResult<Arc<dyn MetadataStore>> {
    Err(ServerError::Config(
        "the redis metadata backend requires the `redis` feature".into(),
    ))
}
