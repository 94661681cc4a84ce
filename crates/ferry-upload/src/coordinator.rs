//! The upload coordinator state machine.
//!
//! A submission moves through these steps:
//!
//! 1. dedup by identifier, then by target location
//! 2. part write, skipped if this process already wrote the part
//! 3. authoritative re-listing of the session's parts, with a bounded
//!    rewrite loop when the just-written part is missing
//! 4. completion test on part count and byte total
//! 5. merge admission through the [`MergeGate`], then assembly
//! 6. dedup record, part cleanup, tracker teardown
//!
//! Completion is never derived from per-arrival counters, only from the
//! listing, so duplicate and out-of-order submissions are harmless.

use std::collections::BTreeMap;
use std::sync::Arc;

use ferry_gate::{MergeGate, PartTracker};
use ferry_meta::{DedupIndex, MetadataStore};
use ferry_store::{ObjectInfo, ObjectStore, StoreError};
use ferry_types::{
    parse_part_index, ContentId, DedupRecord, Location, SessionKey, SessionProgress,
    SessionStatus,
};
use tracing::{debug, info, instrument, warn};

use crate::assembly::{assemble, AssemblyPart};
use crate::config::UploadConfig;
use crate::error::{UploadError, UploadResult};
use crate::request::{PartSubmission, ValidatedSubmission};

// ---------------------------------------------------------------------------
// PartListing
// ---------------------------------------------------------------------------

/// Valid parts of one session as reported by the backend.
#[derive(Debug, Default)]
struct PartListing {
    parts: BTreeMap<u32, ObjectInfo>,
    bytes: u64,
}

impl PartListing {
    fn progress(&self, sub: &ValidatedSubmission) -> SessionProgress {
        SessionProgress {
            uploaded_parts: self.parts.len() as u32,
            uploaded_bytes: self.bytes,
            total_parts: sub.total_parts,
            total_size: sub.total_size,
        }
    }

    fn names(&self) -> Vec<String> {
        self.parts.values().map(|info| info.name.clone()).collect()
    }

    fn into_assembly_parts(self) -> Vec<AssemblyPart> {
        self.parts
            .into_iter()
            .map(|(index, info)| AssemblyPart {
                index,
                name: info.name,
                fingerprint: info.fingerprint,
                size: info.size,
            })
            .collect()
    }
}

/// Result of writing a part.
enum Landed {
    /// The part is present in this listing.
    Listed(PartListing),
    /// The part went missing because the session was merged meanwhile.
    Merged(Location),
}

/// Where a session will end up.
enum Target {
    /// Assemble into this location.
    Fresh(Location),
    /// The same content already lives here.
    Existing(Location),
}

// ---------------------------------------------------------------------------
// UploadCoordinator
// ---------------------------------------------------------------------------

/// Coordinates resumable chunked uploads with content dedup.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct UploadCoordinator {
    store: Arc<dyn ObjectStore>,
    dedup: DedupIndex,
    tracker: PartTracker,
    gate: MergeGate,
    config: UploadConfig,
}

impl UploadCoordinator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        meta: Arc<dyn MetadataStore>,
        config: UploadConfig,
    ) -> Self {
        Self {
            store,
            dedup: DedupIndex::new(meta),
            tracker: PartTracker::new(),
            gate: MergeGate::new(),
            config,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn dedup_index(&self) -> &DedupIndex {
        &self.dedup
    }

    pub fn merge_gate(&self) -> &MergeGate {
        &self.gate
    }

    pub fn part_tracker(&self) -> &PartTracker {
        &self.tracker
    }

    /// Final location of previously assembled content, if any.
    pub async fn dedup_by_identifier(&self, identifier: &str) -> UploadResult<Option<DedupRecord>> {
        let id = ContentId::parse(identifier).map_err(|e| UploadError::Validation(e.to_string()))?;
        Ok(self.dedup.by_identifier(&id).await?)
    }

    /// Record of whatever content was assembled at `container/name`, if any.
    pub async fn dedup_by_location(
        &self,
        container: &str,
        name: &str,
    ) -> UploadResult<Option<DedupRecord>> {
        let location =
            Location::new(container, name).map_err(|e| UploadError::Validation(e.to_string()))?;
        Ok(self.dedup.by_location(&location).await?)
    }

    /// Submit one part of a resumable upload.
    ///
    /// Safe to call concurrently for any mix of sessions and parts. Dropping
    /// the returned future at any point leaves the merge gate released.
    pub async fn submit_part(&self, submission: PartSubmission) -> UploadResult<SessionStatus> {
        let sub = submission.validate()?;
        self.submit_validated(sub).await
    }

    #[instrument(
        name = "submit_part",
        skip_all,
        fields(session = %sub.key, part = sub.index, total = sub.total_parts)
    )]
    pub async fn submit_validated(&self, sub: ValidatedSubmission) -> UploadResult<SessionStatus> {
        let key = &sub.key;

        if let Some(location) = self.live_location_of(key).await? {
            debug!(location = %location, "dedup hit by identifier");
            return Ok(SessionStatus::deduplicated(location));
        }

        let container = &sub.target.container;
        if self.config.require_existing_container && !self.store.container_exists(container).await? {
            return Err(UploadError::ContainerNotFound(container.clone()));
        }

        let target = match self.resolve_target(&sub).await? {
            Target::Existing(location) => {
                debug!(location = %location, "dedup hit by location");
                return Ok(SessionStatus::deduplicated(location));
            }
            Target::Fresh(location) => location,
        };

        let listing = match self.write_part(&sub).await? {
            Landed::Listed(listing) => listing,
            Landed::Merged(location) => return Ok(SessionStatus::deduplicated(location)),
        };

        let progress = listing.progress(&sub);
        if !progress.is_complete() {
            debug!(
                uploaded = progress.uploaded_parts,
                bytes = progress.uploaded_bytes,
                "session incomplete"
            );
            return Ok(SessionStatus::in_progress(progress));
        }

        let Some(permit) = self.gate.try_acquire(key) else {
            debug!("session complete, merge already underway");
            return Ok(SessionStatus::merging(progress));
        };

        // A merge may have finished between our listing and the acquire.
        if let Some(record) = self.dedup.by_identifier(key.id()).await? {
            debug!(location = %record.location, "session merged concurrently");
            self.discard_parts(container, listing.names()).await;
            self.tracker.clear(key);
            return Ok(SessionStatus::deduplicated(record.location));
        }

        info!(location = %target, parts = progress.uploaded_parts, bytes = progress.uploaded_bytes, "assembling");
        let names = listing.names();
        let assembled = match assemble(
            self.store.as_ref(),
            &target,
            listing.into_assembly_parts(),
            self.config.spool_dir.as_deref(),
        )
        .await
        {
            Ok(assembled) => assembled,
            Err(UploadError::MergeConflict { index, name }) => {
                warn!(conflict_part = index, name = %name, "part changed during assembly");
                self.tracker.forget(key, index);
                return Err(UploadError::MergeConflict { index, name });
            }
            Err(e) => {
                warn!(error = %e, "assembly failed");
                return Err(e);
            }
        };

        // Recorded before the parts go away, so a racing submission that
        // finds its part missing also finds the record.
        let record = DedupRecord::new(key.id().clone(), assembled.location.clone(), assembled.size);
        self.dedup.record(&record).await?;
        self.discard_parts(container, names).await;
        self.tracker.clear(key);
        drop(permit);

        info!(
            location = %assembled.location,
            size = assembled.size,
            strategy = ?assembled.strategy,
            "upload assembled"
        );
        Ok(SessionStatus::assembled(assembled.location, progress))
    }

    /// Write the part if needed and list the session until the part shows
    /// up, rewriting it at most `max_part_attempts` times.
    async fn write_part(&self, sub: &ValidatedSubmission) -> UploadResult<Landed> {
        let key = &sub.key;
        let container = &sub.target.container;
        let part_name = sub.part_name();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if !self.tracker.is_known_uploaded(key, sub.index) {
                let fingerprint = self
                    .store
                    .put(container, &part_name, sub.data.clone())
                    .await?;
                self.tracker.mark_uploaded(key, sub.index);
                debug!(attempt, %fingerprint, len = sub.data.len(), "part written");
            }

            let listing = self.list_parts(sub).await?;
            if listing.parts.contains_key(&sub.index) {
                return Ok(Landed::Listed(listing));
            }

            self.tracker.forget(key, sub.index);
            warn!(attempt, name = %part_name, "written part missing from listing");

            if let Some(record) = self.dedup.by_identifier(key.id()).await? {
                return Ok(Landed::Merged(record.location));
            }
            if attempt >= self.config.max_part_attempts {
                return Err(UploadError::PartUploadFailed {
                    index: sub.index,
                    attempts: attempt,
                });
            }
        }
    }

    /// Authoritative view of the session's parts. Names that do not parse
    /// or fall outside `1..=total_parts` are ignored.
    async fn list_parts(&self, sub: &ValidatedSubmission) -> UploadResult<PartListing> {
        let objects = self
            .store
            .list(&sub.target.container, &sub.key.part_prefix())
            .await?;

        let mut listing = PartListing::default();
        for info in objects {
            match parse_part_index(&sub.key, &info.name) {
                Some(index) if index <= sub.total_parts => {
                    listing.bytes += info.size;
                    listing.parts.insert(index, info);
                }
                _ => debug!(name = %info.name, "ignoring stray object under part prefix"),
            }
        }
        Ok(listing)
    }

    /// Decide the final location, disambiguating when the requested name is
    /// already held by different content.
    async fn resolve_target(&self, sub: &ValidatedSubmission) -> UploadResult<Target> {
        let id = sub.key.id();
        let requested = &sub.target;

        let occupant = match self.live_occupant(requested).await? {
            None => return Ok(Target::Fresh(requested.clone())),
            Some(record) if &record.identifier == id => {
                // Location view present without its identifier key.
                self.dedup.record(&record).await?;
                return Ok(Target::Existing(record.location));
            }
            Some(record) => record,
        };

        if !self.config.rename_conflicting_targets {
            return Err(UploadError::TargetConflict {
                location: requested.clone(),
                existing: occupant.identifier,
            });
        }

        let Ok(renamed) = requested.disambiguated(id) else {
            // No valid alternative name exists.
            return Err(UploadError::TargetConflict {
                location: requested.clone(),
                existing: occupant.identifier,
            });
        };
        debug!(requested = %requested, renamed = %renamed, held_by = %occupant.identifier.short(), "target name taken");
        match self.live_occupant(&renamed).await? {
            None => Ok(Target::Fresh(renamed)),
            Some(record) if &record.identifier == id => Ok(Target::Existing(record.location)),
            Some(record) => Err(UploadError::TargetConflict {
                location: renamed,
                existing: record.identifier,
            }),
        }
    }

    /// Final location recorded for the session's content, dropping the
    /// record if its object has since disappeared.
    async fn live_location_of(&self, key: &SessionKey) -> UploadResult<Option<Location>> {
        let Some(record) = self.dedup.by_identifier(key.id()).await? else {
            return Ok(None);
        };
        if self.is_stale(&record).await? {
            warn!(location = %record.location, "dedup record points at a missing object, discarding");
            self.dedup.remove(&record).await?;
            self.tracker.clear(key);
            return Ok(None);
        }
        Ok(Some(record.location))
    }

    async fn live_occupant(&self, location: &Location) -> UploadResult<Option<DedupRecord>> {
        let Some(record) = self.dedup.by_location(location).await? else {
            return Ok(None);
        };
        if self.is_stale(&record).await? {
            warn!(location = %location, "location record points at a missing object, discarding");
            self.dedup.remove(&record).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn is_stale(&self, record: &DedupRecord) -> UploadResult<bool> {
        if !self.config.verify_dedup_targets {
            return Ok(false);
        }
        let location = &record.location;
        match self.store.stat(&location.container, &location.name).await {
            Ok(info) => Ok(info.is_none()),
            Err(StoreError::ContainerNotFound(_)) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    async fn discard_parts(&self, container: &str, names: Vec<String>) {
        if names.is_empty() {
            return;
        }
        if let Err(e) = self.store.delete(container, &names).await {
            warn!(container, parts = names.len(), error = %e, "failed to delete assembled parts");
        }
    }
}

impl std::fmt::Debug for UploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadCoordinator")
            .field("store", &self.store.backend_name())
            .field("dedup", &self.dedup)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
