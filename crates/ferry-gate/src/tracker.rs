use std::collections::BTreeSet;

use dashmap::DashMap;
use ferry_types::SessionKey;

/// Process-local record of which parts of which session have been written.
///
/// Only a hint for skipping redundant writes: completion is always decided
/// from the backend listing. Lost on restart.
#[derive(Debug, Default)]
pub struct PartTracker {
    sessions: DashMap<SessionKey, BTreeSet<u32>>,
}

impl PartTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `index` as durably written. Returns `false` if it was already
    /// known.
    pub fn mark_uploaded(&self, key: &SessionKey, index: u32) -> bool {
        self.sessions.entry(key.clone()).or_default().insert(index)
    }

    pub fn is_known_uploaded(&self, key: &SessionKey, index: u32) -> bool {
        self.sessions
            .get(key)
            .is_some_and(|parts| parts.contains(&index))
    }

    /// Drop the mark for one part, forcing it to be rewritten.
    pub fn forget(&self, key: &SessionKey, index: u32) {
        if let Some(mut parts) = self.sessions.get_mut(key) {
            parts.remove(&index);
        }
        self.sessions.remove_if(key, |_, parts| parts.is_empty());
    }

    /// Discard everything known about `key`.
    pub fn clear(&self, key: &SessionKey) {
        self.sessions.remove(key);
    }

    /// Indices known for `key`, ascending.
    pub fn known_parts(&self, key: &SessionKey) -> Vec<u32> {
        self.sessions
            .get(key)
            .map(|parts| parts.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
