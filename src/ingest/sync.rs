//! Bookkeeping for background sync batches
//!
//! Sync callers get no handle back. Outcomes are only visible here and in
//! the logs, plus an in-flight count the process owner can wait on.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Counters for one kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindSyncStats {
    pub batches_accepted: u64,
    pub batches_completed: u64,
    pub entities_synced: u64,
    pub entities_failed: u64,
}

#[derive(Debug, Default)]
pub struct SyncTracker {
    stats: DashMap<String, KindSyncStats>,
    in_flight: AtomicUsize,
    idle: Notify,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a batch as accepted. The batch counts as in flight until the
    /// returned guard is dropped, including by a panic.
    pub fn begin(self: &Arc<Self>, kind: &str) -> SyncGuard {
        self.stats.entry(kind.to_string()).or_default().batches_accepted += 1;
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        SyncGuard {
            tracker: Arc::clone(self),
            kind: kind.to_string(),
        }
    }

    pub fn record_synced(&self, kind: &str) {
        self.stats.entry(kind.to_string()).or_default().entities_synced += 1;
    }

    pub fn record_failed(&self, kind: &str) {
        self.stats.entry(kind.to_string()).or_default().entities_failed += 1;
    }

    pub fn stats(&self, kind: &str) -> KindSyncStats {
        self.stats.get(kind).map(|s| *s).unwrap_or_default()
    }

    /// Counters for every kind seen so far, ordered by kind.
    pub fn snapshot(&self) -> BTreeMap<String, KindSyncStats> {
        self.stats
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolve once no batch is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Held by a running batch
pub struct SyncGuard {
    tracker: Arc<SyncTracker>,
    kind: String,
}

impl Drop for SyncGuard {
    fn drop(&mut self) {
        self.tracker
            .stats
            .entry(self.kind.clone())
            .or_default()
            .batches_completed += 1;
        if self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}
