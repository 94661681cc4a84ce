//! Per-session admission control for ferry.
//!
//! Both structures are keyed by [`SessionKey`](ferry_types::SessionKey) and
//! backed by sharded concurrent maps, so unrelated sessions never contend on
//! a shared lock.
//!
//! - [`MergeGate`] -- at most one assembly per session at any instant
//! - [`PartTracker`] -- process-local record of parts known to be written

pub mod merge_gate;
pub mod tracker;

pub use merge_gate::{MergeGate, MergePermit};
pub use tracker::PartTracker;
