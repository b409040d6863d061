//! Counters kept by [`ShardedStore`](crate::ShardedStore).
//!
//! The store bumps these as it publishes, clears, serves reads and fans out
//! to watchers and ports. Readers get monotonic totals since construction.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for one store.
///
/// Counters use relaxed atomics: each total is exact, but totals read
/// together are not a consistent cut.
#[derive(Debug, Default)]
pub struct StoreStats {
    published: AtomicU64,
    reads_found: AtomicU64,
    reads_missing: AtomicU64,
    cleared: AtomicU64,
    watchers_woken: AtomicU64,
    watches_registered: AtomicU64,
    ports_detached: AtomicU64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl StoreStats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_set(&self) {
        bump(&self.published, 1);
    }

    pub(crate) fn record_hit(&self) {
        bump(&self.reads_found, 1);
    }

    pub(crate) fn record_miss(&self) {
        bump(&self.reads_missing, 1);
    }

    /// Only clears that dropped a snapshot are counted.
    pub(crate) fn record_clear(&self) {
        bump(&self.cleared, 1);
    }

    pub(crate) fn record_notifications(&self, watchers: u64) {
        bump(&self.watchers_woken, watchers);
    }

    pub(crate) fn record_watch(&self) {
        bump(&self.watches_registered, 1);
    }

    pub(crate) fn record_ports_detached(&self, ports: u64) {
        bump(&self.ports_detached, ports);
    }

    /// Snapshots published, by `set` or `modify`.
    pub fn snapshots_set(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// `get_snapshot` calls that found a snapshot.
    pub fn snapshot_hits(&self) -> u64 {
        self.reads_found.load(Ordering::Relaxed)
    }

    /// `get_snapshot` calls on a node without one.
    pub fn snapshot_misses(&self) -> u64 {
        self.reads_missing.load(Ordering::Relaxed)
    }

    /// Snapshots dropped by `clear_snapshot`.
    pub fn snapshots_cleared(&self) -> u64 {
        self.cleared.load(Ordering::Relaxed)
    }

    /// Live watchers present at each publication, summed.
    pub fn notifications_sent(&self) -> u64 {
        self.watchers_woken.load(Ordering::Relaxed)
    }

    /// Watches ever registered, including cancelled ones.
    pub fn watches_created(&self) -> u64 {
        self.watches_registered.load(Ordering::Relaxed)
    }

    /// Ports dropped from fan-out after reporting closed.
    pub fn ports_detached(&self) -> u64 {
        self.ports_detached.load(Ordering::Relaxed)
    }
}
