//! Watch system for snapshot change notifications.
//!
//! The watch system provides:
//! - Unique watch identifiers ([`WatchId`])
//! - Watch subscriptions ([`Watch`]) that resolve when a node's version changes
//! - The per-node publication slot ([`NodeSlot`]) shared by writers and watchers
//!
//! Each node owns a `tokio::sync::watch` channel carrying its current
//! [`NodeState`]. A watch subscribes first and compares versions second, so a
//! publication racing with registration is either visible to the comparison
//! or marks the receiver as changed. There is no lost-wakeup window.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use snapstore_core::{NodeKey, Version};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::Snapshot;

/// Unique identifier for a watch subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

impl WatchId {
    /// Create a new unique watch ID.
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric value of this watch ID.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch-{}", self.0)
    }
}

/// What a resolved watch observed.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A snapshot whose version differs from the watcher's last known one.
    Snapshot(Arc<Snapshot>),
    /// The node's snapshot was cleared.
    Removed,
    /// The store was dropped; no further events will arrive.
    Closed,
}

impl WatchEvent {
    /// The delivered snapshot, if any.
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Self::Snapshot(s) => Some(s),
            Self::Removed | Self::Closed => None,
        }
    }

    /// Check if this is a removal signal.
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }
}

/// Terminal state of a cancellable wait.
#[derive(Debug, Clone)]
pub enum WatchOutcome {
    /// The watch resolved.
    Resolved(WatchEvent),
    /// The caller gave up first.
    Cancelled,
}

/// Published state of a node, as seen by watchers.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeState {
    /// Current snapshot, `None` before the first set or after a clear.
    pub(crate) snapshot: Option<Arc<Snapshot>>,
    /// Incremented on every set and clear.
    pub(crate) generation: u64,
    /// Generation of the most recent clear.
    pub(crate) cleared_at: Option<u64>,
}

/// Per-node publication slot.
///
/// `write` serializes every set, clear, and read-modify-write on the node.
/// It is never held across an `.await`.
#[derive(Debug)]
pub(crate) struct NodeSlot {
    state: watch::Sender<NodeState>,
    write: Mutex<()>,
}

impl NodeSlot {
    pub(crate) fn new() -> Self {
        let (state, _) = watch::channel(NodeState::default());
        Self {
            state,
            write: Mutex::new(()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.write.lock()
    }

    pub(crate) fn current(&self) -> Option<Arc<Snapshot>> {
        self.state.borrow().snapshot.clone()
    }

    pub(crate) fn has_snapshot(&self) -> bool {
        self.state.borrow().snapshot.is_some()
    }

    /// Swap in a new snapshot. Returns the number of live watchers.
    pub(crate) fn publish(&self, snapshot: Arc<Snapshot>) -> usize {
        self.state.send_modify(|state| {
            state.generation += 1;
            state.snapshot = Some(snapshot);
        });
        self.state.receiver_count()
    }

    /// Drop the snapshot and signal removal. Returns whether one existed.
    ///
    /// Without a snapshot nothing changes and no watcher is woken.
    pub(crate) fn clear(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.snapshot.take().is_none() {
                return false;
            }
            state.generation += 1;
            state.cleared_at = Some(state.generation);
            true
        })
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<NodeState> {
        self.state.subscribe()
    }

    pub(crate) fn watcher_count(&self) -> usize {
        self.state.receiver_count()
    }

    /// No snapshot and nobody watching. Caller must hold the write lock.
    pub(crate) fn is_idle(&self) -> bool {
        !self.has_snapshot() && self.watcher_count() == 0
    }

    /// Like [`NodeSlot::is_idle`], but treats a slot with a writer in
    /// progress as busy.
    pub(crate) fn is_idle_unlocked(&self) -> bool {
        match self.write.try_lock() {
            Some(_guard) => self.is_idle(),
            None => false,
        }
    }
}

/// A pending subscription to a node's snapshot.
///
/// A watch resolves once the node holds a snapshot whose version differs
/// from the last version the watcher saw, or once the node is cleared.
/// Dropping a watch releases its registration.
///
/// [`Watch::next`] can be called repeatedly: each call remembers what it
/// delivered, so a stream of calls yields every later version change once
/// (intermediate versions published in quick succession may be coalesced).
#[derive(Debug)]
pub struct Watch {
    /// Unique identifier for this watch.
    id: WatchId,
    /// Node this watch is subscribed to.
    node: NodeKey,
    /// Version the watcher already has.
    last_known: Option<Version>,
    /// Node generation at registration or last delivery.
    seen_generation: u64,
    /// Receiver for state changes.
    receiver: watch::Receiver<NodeState>,
}

impl Watch {
    pub(crate) fn new(
        node: NodeKey,
        last_known: Option<Version>,
        receiver: watch::Receiver<NodeState>,
    ) -> Self {
        let seen_generation = receiver.borrow().generation;
        Self {
            id: WatchId::next(),
            node,
            last_known,
            seen_generation,
            receiver,
        }
    }

    /// Get the unique identifier for this watch.
    #[inline]
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Get the node this watch is subscribed to.
    #[inline]
    pub fn node(&self) -> &NodeKey {
        &self.node
    }

    /// The version the watcher will not be woken for.
    #[inline]
    pub fn last_known(&self) -> Option<&Version> {
        self.last_known.as_ref()
    }

    /// Resolve without waiting, if the current state already qualifies.
    pub fn try_next(&mut self) -> Option<WatchEvent> {
        let state = self.receiver.borrow_and_update();
        let event = evaluate(self.last_known.as_ref(), self.seen_generation, &state)?;
        self.seen_generation = state.generation;
        self.last_known = event.snapshot().map(|s| s.version().clone());
        Some(event)
    }

    /// Wait for the next version change or removal.
    pub async fn next(&mut self) -> WatchEvent {
        loop {
            if let Some(event) = self.try_next() {
                trace!(watch_id = %self.id, node = %self.node, "watch resolved");
                return event;
            }
            if self.receiver.changed().await.is_err() {
                // Sender gone; one final look in case the last value was unseen.
                return self.try_next().unwrap_or(WatchEvent::Closed);
            }
        }
    }

    /// Wait for a single event and release the registration.
    pub async fn resolve(mut self) -> WatchEvent {
        self.next().await
    }

    /// Wait for a single event unless `cancel` fires first.
    ///
    /// The registration is released either way.
    pub async fn resolve_or_cancel(mut self, cancel: &CancellationToken) -> WatchOutcome {
        let id = self.id;
        let node = self.node.clone();
        tokio::select! {
            biased;
            event = self.next() => WatchOutcome::Resolved(event),
            () = cancel.cancelled() => {
                debug!(watch_id = %id, node = %node, "watch cancelled");
                WatchOutcome::Cancelled
            }
        }
    }
}

fn evaluate(
    last_known: Option<&Version>,
    seen_generation: u64,
    state: &NodeState,
) -> Option<WatchEvent> {
    let cleared_since = state.cleared_at.is_some_and(|g| g > seen_generation);
    match &state.snapshot {
        Some(snapshot) if cleared_since || last_known != Some(snapshot.version()) => {
            Some(WatchEvent::Snapshot(Arc::clone(snapshot)))
        }
        Some(_) => None,
        None if cleared_since => Some(WatchEvent::Removed),
        None => None,
    }
}
