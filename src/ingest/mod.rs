//! Entity ingestion
//!
//! Create, update, delete and get are synchronous against the graph store.
//! Sync hands a whole snapshot to a detached background task.

mod service;
mod sync;

pub use service::{canonical_kind, EntityService};
pub use sync::{KindSyncStats, SyncGuard, SyncTracker};
