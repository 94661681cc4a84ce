//! Redis-backed metadata store.
//!
//! Plain keys map to Redis strings and tables map to Redis hashes, so the
//! data stays readable with `redis-cli`. Enabled with the `redis` cargo
//! feature.
//!
//! The [`ConnectionManager`] multiplexes one connection and reconnects on
//! failure; every call works on its own clone of it.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use crate::error::{MetaError, Result};
use crate::traits::MetadataStore;

fn backend(op: &str, err: redis::RedisError) -> MetaError {
    MetaError::Backend(format!("redis {op} failed: {err}"))
}

/// A [`MetadataStore`] backed by a Redis server.
#[derive(Clone)]
pub struct RedisMetadataStore {
    connection: ConnectionManager,
}

impl RedisMetadataStore {
    /// Connect to the server at `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| backend("open", e))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| backend("connect", e))?;
        info!(url, "connected to redis metadata store");
        Ok(Self { connection })
    }
}

impl std::fmt::Debug for RedisMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMetadataStore").finish_non_exhaustive()
    }
}

#[async_trait]
impl MetadataStore for RedisMetadataStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| backend("get", e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| backend("set", e))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| backend("exists", e))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(key).await.map_err(|e| backend("del", e))?;
        Ok(removed > 0)
    }

    async fn hash_get(&self, table: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        conn.hget::<_, _, Option<String>>(table, field)
            .await
            .map_err(|e| backend("hget", e))
    }

    async fn hash_set(&self, table: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        conn.hset::<_, _, _, ()>(table, field, value)
            .await
            .map_err(|e| backend("hset", e))
    }

    async fn hash_delete(&self, table: &str, field: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn
            .hdel(table, field)
            .await
            .map_err(|e| backend("hdel", e))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_malformed_url() {
        let err = RedisMetadataStore::connect("not a url").await.unwrap_err();
        assert!(matches!(err, MetaError::Backend(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "needs a redis server at FERRY_TEST_REDIS_URL"]
    async fn concurrent_calls_share_one_manager() {
        let url = std::env::var("FERRY_TEST_REDIS_URL").unwrap();
        let store = RedisMetadataStore::connect(&url).await.unwrap();
        let table = format!("ferry:test:{}", std::process::id());

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                let table = table.clone();
                tokio::spawn(async move {
                    let field = format!("f{i}");
                    store.hash_set(&table, &field, "x").await.unwrap();
                    assert_eq!(store.hash_get(&table, &field).await.unwrap().as_deref(), Some("x"));
                    assert!(store.hash_delete(&table, &field).await.unwrap());
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert!(!store.exists(&table).await.unwrap());
    }
}
