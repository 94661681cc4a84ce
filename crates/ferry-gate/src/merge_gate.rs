use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ferry_types::SessionKey;
use tracing::debug;

// ---------------------------------------------------------------------------
// Hold
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct Hold {
    token: u64,
    since: Instant,
}

type Holds = Arc<DashMap<SessionKey, Hold>>;

// ---------------------------------------------------------------------------
// MergeGate
// ---------------------------------------------------------------------------

/// Exclusive per-session flag guarding assembly.
///
/// Acquisition goes through the map's entry API, which locks the key's shard
/// for the check-and-insert, so two racing callers can never both observe
/// the flag as clear.
#[derive(Clone, Debug, Default)]
pub struct MergeGate {
    holds: Holds,
    next_token: Arc<AtomicU64>,
}

impl MergeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the gate for `key` if nobody holds it.
    ///
    /// The returned permit releases the gate when dropped, which covers
    /// early returns, errors and cancelled futures alike.
    pub fn try_acquire(&self, key: &SessionKey) -> Option<MergePermit> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        match self.holds.entry(key.clone()) {
            Entry::Occupied(_) => {
                debug!(session = %key, "merge gate already held");
                None
            }
            Entry::Vacant(slot) => {
                slot.insert(Hold {
                    token,
                    since: Instant::now(),
                });
                debug!(session = %key, "merge gate acquired");
                Some(MergePermit {
                    holds: Arc::clone(&self.holds),
                    key: key.clone(),
                    token,
                })
            }
        }
    }

    /// Clear the flag for `key` regardless of who holds it.
    ///
    /// An outstanding permit for the cleared hold becomes inert: dropping it
    /// will not release a hold acquired afterwards.
    pub fn release(&self, key: &SessionKey) {
        if self.holds.remove(key).is_some() {
            debug!(session = %key, "merge gate force-released");
        }
    }

    pub fn is_held(&self, key: &SessionKey) -> bool {
        self.holds.contains_key(key)
    }

    /// How long the current holder of `key` has held the gate.
    pub fn held_for(&self, key: &SessionKey) -> Option<Duration> {
        self.holds.get(key).map(|hold| hold.since.elapsed())
    }

    /// Number of sessions currently being assembled.
    pub fn held_count(&self) -> usize {
        self.holds.len()
    }
}

// ---------------------------------------------------------------------------
// MergePermit
// ---------------------------------------------------------------------------

/// Proof of holding the [`MergeGate`] for one session.
#[derive(Debug)]
#[must_use = "the merge gate is released as soon as the permit is dropped"]
pub struct MergePermit {
    holds: Holds,
    key: SessionKey,
    token: u64,
}

impl MergePermit {
    pub fn key(&self) -> &SessionKey {
        &self.key
    }
}

impl Drop for MergePermit {
    fn drop(&mut self) {
        let token = self.token;
        if self
            .holds
            .remove_if(&self.key, |_, hold| hold.token == token)
            .is_some()
        {
            debug!(session = %self.key, "merge gate released");
        }
    }
}
