//! Typed dedup lookups on top of a [`MetadataStore`].
//!
//! Two views of the same [`DedupRecord`] are kept:
//!
//! - `ferry:dedup:{identifier}` → record, answering "has this content been
//!   assembled before, and where?"
//! - hash `ferry:locations:{container}`, field `{name}` → record, answering
//!   "which content lives at this location?"

use std::sync::Arc;

use ferry_types::{ContentId, DedupRecord, Location};
use tracing::{debug, warn};

use crate::error::{MetaError, Result};
use crate::traits::MetadataStore;

const IDENTIFIER_PREFIX: &str = "ferry:dedup:";
const LOCATION_PREFIX: &str = "ferry:locations:";

fn identifier_key(id: &ContentId) -> String {
    format!("{IDENTIFIER_PREFIX}{id}")
}

fn location_table(container: &str) -> String {
    format!("{LOCATION_PREFIX}{container}")
}

fn decode(key: &str, raw: &str) -> Result<DedupRecord> {
    DedupRecord::from_json(raw).map_err(|e| MetaError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// The dedup index used by the upload coordinator.
#[derive(Clone)]
pub struct DedupIndex {
    store: Arc<dyn MetadataStore>,
}

impl DedupIndex {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    /// Record for content `id`, if it has been assembled before.
    pub async fn by_identifier(&self, id: &ContentId) -> Result<Option<DedupRecord>> {
        let key = identifier_key(id);
        match self.store.get(&key).await? {
            Some(raw) => decode(&key, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Record for whatever content currently occupies `location`.
    pub async fn by_location(&self, location: &Location) -> Result<Option<DedupRecord>> {
        let table = location_table(&location.container);
        match self.store.hash_get(&table, &location.name).await? {
            Some(raw) => decode(&format!("{table}#{}", location.name), &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Write both views of `record`.
    ///
    /// The identifier key is written last, so a reader that finds it can rely
    /// on the location view being present as well.
    pub async fn record(&self, record: &DedupRecord) -> Result<()> {
        let json = record
            .to_json()
            .map_err(|e| MetaError::Serialization(e.to_string()))?;
        self.store
            .hash_set(
                &location_table(&record.location.container),
                &record.location.name,
                &json,
            )
            .await?;
        self.store
            .set(&identifier_key(&record.identifier), &json)
            .await?;
        debug!(id = %record.identifier.short(), location = %record.location, "dedup record written");
        Ok(())
    }

    /// Remove both views of `record`. The location view is only removed if
    /// it still points at the same identifier.
    pub async fn remove(&self, record: &DedupRecord) -> Result<()> {
        self.store.delete(&identifier_key(&record.identifier)).await?;
        match self.by_location(&record.location).await {
            Ok(Some(current)) if current.identifier == record.identifier => {
                self.store
                    .hash_delete(
                        &location_table(&record.location.container),
                        &record.location.name,
                    )
                    .await?;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(location = %record.location, error = %e, "unreadable location record left in place");
            }
        }
        debug!(id = %record.identifier.short(), "dedup record removed");
        Ok(())
    }
}

impl std::fmt::Debug for DedupIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupIndex")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}
