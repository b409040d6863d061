//! SnapshotStore trait and ShardedStore implementation.
//!
//! The store maps node keys to their current snapshot. The [`ShardedStore`]
//! implementation keeps one [`NodeSlot`] per node in a `DashMap`; the slot
//! carries the node's write lock and the watch channel its watchers listen on.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::RwLock;
use snapstore_core::{NodeKey, NodeKeyHasher, StoreError, Version};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::port::{Delivery, StoreEvent, WatchPort};
use crate::snapshot::Snapshot;
use crate::stats::StoreStats;
use crate::watch::{NodeSlot, Watch};

/// Trait for per-node snapshot stores.
///
/// Provides the interface the discovery layer and mutation engine rely on.
pub trait SnapshotStore: Send + Sync {
    /// Get the current snapshot for a node, `None` if never set or cleared.
    fn get_snapshot(&self, node: &NodeKey) -> Option<Arc<Snapshot>>;

    /// Replace the node's snapshot unconditionally.
    ///
    /// Wakes every watch whose last known version differs from the new one.
    fn set_snapshot(&self, node: &NodeKey, snapshot: Snapshot) -> Arc<Snapshot>;

    /// Remove the node's snapshot. Pending watches resolve as removed.
    ///
    /// Returns whether a snapshot existed.
    fn clear_snapshot(&self, node: &NodeKey) -> bool;

    /// Register a watch for a node.
    ///
    /// The watch resolves with a snapshot whose version differs from
    /// `last_known` (any snapshot when `None`), immediately if one is
    /// already current.
    fn watch(&self, node: &NodeKey, last_known: Option<&Version>) -> Watch;

    /// Get the number of nodes with a snapshot.
    fn snapshot_count(&self) -> usize;

    /// Like [`SnapshotStore::get_snapshot`], but a missing snapshot is an error.
    fn require_snapshot(&self, node: &NodeKey) -> Result<Arc<Snapshot>, StoreError> {
        self.get_snapshot(node).ok_or_else(|| StoreError::NotFound {
            node: node.to_string(),
        })
    }
}

/// A sharded snapshot store using DashMap.
///
/// This store implementation:
/// - Serializes writers per node, never across nodes
/// - Publishes by swapping an `Arc<Snapshot>`, so readers see whole snapshots
/// - Wakes watches through a per-node `tokio::sync::watch` channel
/// - Forwards every publication and removal to attached [`WatchPort`]s
/// - Tracks statistics for monitoring
///
/// ## Locking
///
/// A node's write lock is taken after the map reference is dropped, and map
/// shards are never locked while waiting for a node's write lock. No lock is
/// held across an `.await`.
#[derive(Debug)]
pub struct ShardedStore {
    /// Publication slots keyed by node.
    slots: DashMap<NodeKey, Arc<NodeSlot>, NodeKeyHasher>,
    /// Outbound ports.
    ports: RwLock<Vec<Arc<dyn WatchPort>>>,
    /// Statistics.
    stats: StoreStats,
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedStore {
    /// Create a new store with default settings.
    pub fn new() -> Self {
        Self::with_capacity(StoreConfig::default().initial_capacity)
    }

    /// Create a new store with a specific initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: DashMap::with_capacity_and_hasher(capacity, NodeKeyHasher::default()),
            ports: RwLock::new(Vec::new()),
            stats: StoreStats::new(),
        }
    }

    /// Create a store builder.
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Get store statistics.
    #[inline]
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Attach an outbound port. It sees every later publication and removal.
    pub fn attach_port(&self, port: Arc<dyn WatchPort>) {
        debug!(port = ?port, "attached watch port");
        self.ports.write().push(port);
    }

    /// Get the number of attached ports.
    pub fn port_count(&self) -> usize {
        self.ports.read().len()
    }

    /// Atomically derive and publish a node's next snapshot.
    ///
    /// `f` receives the current snapshot (`None` if the node has none) and
    /// runs inside the node's critical section, so concurrent calls for the
    /// same node never lose an update. If `f` fails nothing is published.
    pub fn modify<F, E>(&self, node: &NodeKey, f: F) -> Result<Arc<Snapshot>, E>
    where
        F: FnOnce(Option<&Arc<Snapshot>>) -> Result<Snapshot, E>,
    {
        self.with_node(node, |slot| {
            let current = slot.current();
            let next = f(current.as_ref())?;
            Ok(self.publish(node, slot, next))
        })
    }

    /// Cancel a watch and reclaim the node's slot if nothing else uses it.
    pub fn cancel_watch(&self, watch: Watch) {
        let id = watch.id();
        let node = watch.node().clone();
        drop(watch);
        self.slots.remove_if(&node, |_, slot| slot.is_idle_unlocked());
        debug!(watch_id = %id, node = %node, "cancelled watch");
    }

    /// Drop slots that hold no snapshot and have no watchers.
    ///
    /// A watch dropped on a node that never had a snapshot leaves such a
    /// slot behind. Call this periodically, or run [`ShardedStore::spawn_pruner`].
    ///
    /// Returns the number of slots reclaimed.
    pub fn prune_idle(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.is_idle_unlocked());
        let pruned = before.saturating_sub(self.slots.len());
        if pruned > 0 {
            debug!(pruned, "pruned idle node slots");
        }
        pruned
    }

    /// Run [`ShardedStore::prune_idle`] every `period` on the current tokio
    /// runtime.
    ///
    /// The task holds a weak reference and exits once the store is dropped
    /// or `shutdown` is cancelled. A zero period is raised to one millisecond.
    pub fn spawn_pruner(
        self: &Arc<Self>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::downgrade(self);
        let period = period.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(store) = store.upgrade() else { break };
                        store.prune_idle();
                    }
                }
            }
            debug!("idle slot pruner stopped");
        })
    }

    /// Get all nodes that currently have a snapshot.
    pub fn nodes(&self) -> Vec<NodeKey> {
        self.slots
            .iter()
            .filter(|r| r.value().has_snapshot())
            .map(|r| r.key().clone())
            .collect()
    }

    /// Check if a snapshot exists for a node.
    pub fn has_snapshot(&self, node: &NodeKey) -> bool {
        self.slots.get(node).is_some_and(|r| r.value().has_snapshot())
    }

    /// Collect every node's current snapshot.
    ///
    /// Note: This acquires read locks on all shards.
    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, Arc<Snapshot>)> {
        let entries: Vec<_> = self
            .slots
            .iter()
            .filter_map(|r| r.value().current().map(|s| (r.key().clone(), s)))
            .collect();
        entries.into_iter()
    }

    /// Get the number of live watches for a node.
    pub fn watch_count(&self, node: &NodeKey) -> usize {
        self.slots
            .get(node)
            .map(|r| r.value().watcher_count())
            .unwrap_or(0)
    }

    /// Get the total number of live watches across all nodes.
    pub fn total_watch_count(&self) -> usize {
        self.slots.iter().map(|r| r.value().watcher_count()).sum()
    }

    /// Get or create the node's slot. The map reference is dropped on return.
    fn slot(&self, node: &NodeKey) -> Arc<NodeSlot> {
        Arc::clone(
            self.slots
                .entry(node.clone())
                .or_insert_with(|| Arc::new(NodeSlot::new()))
                .value(),
        )
    }

    fn is_current(&self, node: &NodeKey, slot: &Arc<NodeSlot>) -> bool {
        self.slots
            .get(node)
            .is_some_and(|r| Arc::ptr_eq(r.value(), slot))
    }

    /// Run `f` holding the write lock of the node's live slot.
    ///
    /// A slot can be reclaimed between lookup and locking; in that case the
    /// lookup is retried so the write never lands in a detached slot.
    fn with_node<R>(&self, node: &NodeKey, f: impl FnOnce(&NodeSlot) -> R) -> R {
        loop {
            let slot = self.slot(node);
            let _guard = slot.lock();
            if self.is_current(node, &slot) {
                return f(&slot);
            }
            trace!(node = %node, "node slot reclaimed during lookup, retrying");
        }
    }

    /// Publish under the node's write lock.
    fn publish(&self, node: &NodeKey, slot: &NodeSlot, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let watchers = slot.publish(Arc::clone(&snapshot));
        self.stats.record_set();
        self.stats.record_notifications(watchers as u64);

        debug!(
            node = %node,
            version = %snapshot.version(),
            resources = snapshot.total_resources(),
            watchers,
            "set snapshot"
        );

        self.deliver(StoreEvent::Published {
            node: node.clone(),
            snapshot: Arc::clone(&snapshot),
        });
        snapshot
    }

    fn deliver(&self, event: StoreEvent) {
        let closed = {
            let ports = self.ports.read();
            if ports.is_empty() {
                return;
            }
            ports
                .iter()
                .filter(|port| port.deliver(&event) == Delivery::Closed)
                .cloned()
                .collect::<Vec<_>>()
        };

        if !closed.is_empty() {
            self.ports
                .write()
                .retain(|port| !closed.iter().any(|c| Arc::ptr_eq(c, port)));
            self.stats.record_ports_detached(closed.len() as u64);
            warn!(count = closed.len(), "detached closed watch ports");
        }
    }
}

impl SnapshotStore for ShardedStore {
    fn get_snapshot(&self, node: &NodeKey) -> Option<Arc<Snapshot>> {
        // Clone the Arc and drop the map reference immediately.
        let result = self.slots.get(node).and_then(|r| r.value().current());

        if result.is_some() {
            self.stats.record_hit();
            trace!(node = %node, "snapshot hit");
        } else {
            self.stats.record_miss();
            trace!(node = %node, "snapshot miss");
        }

        result
    }

    fn set_snapshot(&self, node: &NodeKey, snapshot: Snapshot) -> Arc<Snapshot> {
        self.with_node(node, |slot| self.publish(node, slot, snapshot))
    }

    fn clear_snapshot(&self, node: &NodeKey) -> bool {
        loop {
            let Some(slot) = self.slots.get(node).map(|r| Arc::clone(r.value())) else {
                return false;
            };
            let _guard = slot.lock();
            if !self.is_current(node, &slot) {
                continue;
            }

            let existed = slot.clear();
            if existed {
                self.stats.record_clear();
                info!(node = %node, "cleared snapshot");
                self.deliver(StoreEvent::Removed { node: node.clone() });
            }
            // The write lock is ours, so check idleness directly.
            self.slots
                .remove_if(node, |_, s| Arc::ptr_eq(s, &slot) && s.is_idle());
            return existed;
        }
    }

    fn watch(&self, node: &NodeKey, last_known: Option<&Version>) -> Watch {
        // Subscribe under the shard lock so a concurrent prune cannot
        // detach the slot between lookup and subscription.
        let receiver = self
            .slots
            .entry(node.clone())
            .or_insert_with(|| Arc::new(NodeSlot::new()))
            .value()
            .subscribe();

        let watch = Watch::new(node.clone(), last_known.cloned(), receiver);
        self.stats.record_watch();
        debug!(
            watch_id = %watch.id(),
            node = %node,
            last_known = last_known.map(Version::as_str).unwrap_or(""),
            "created watch"
        );
        watch
    }

    fn snapshot_count(&self) -> usize {
        self.slots.iter().filter(|r| r.value().has_snapshot()).count()
    }
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Initial capacity of the node map.
    pub initial_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
        }
    }
}

/// Builder for creating a configured store.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    config: StoreConfig,
    ports: Vec<Arc<dyn WatchPort>>,
}

impl StoreBuilder {
    /// Create a new store builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial capacity.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Attach a port at construction time.
    pub fn port(mut self, port: Arc<dyn WatchPort>) -> Self {
        self.ports.push(port);
        self
    }

    /// Build the store.
    pub fn build(self) -> ShardedStore {
        let store = ShardedStore::with_capacity(self.config.initial_capacity);
        *store.ports.write() = self.ports;
        store
    }
}
