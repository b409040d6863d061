//! Outbound notification ports.
//!
//! A [`WatchPort`] is how the discovery layer hears about every publication
//! and removal, in per-node publication order. Ports are invoked while the
//! node's write lock is held, so implementations must not block.

use std::fmt;
use std::sync::Arc;

use snapstore_core::NodeKey;
use tokio::sync::mpsc;
use tracing::trace;

use crate::Snapshot;

/// A change emitted by the store.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A snapshot was published for a node.
    Published {
        /// The node.
        node: NodeKey,
        /// The newly current snapshot.
        snapshot: Arc<Snapshot>,
    },
    /// A node's snapshot was cleared.
    Removed {
        /// The node.
        node: NodeKey,
    },
}

impl StoreEvent {
    /// The node this event concerns.
    pub fn node(&self) -> &NodeKey {
        match self {
            Self::Published { node, .. } | Self::Removed { node } => node,
        }
    }
}

/// Result of handing an event to a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The port accepted the event.
    Delivered,
    /// The port was saturated and skipped the event.
    Dropped,
    /// The port is gone and should be detached.
    Closed,
}

/// Subscriber-facing interface the store publishes changes through.
pub trait WatchPort: Send + Sync + fmt::Debug {
    /// Deliver one event. Must not block.
    fn deliver(&self, event: &StoreEvent) -> Delivery;
}

/// A [`WatchPort`] backed by a bounded `mpsc` channel.
///
/// Uses `try_send`; when the channel is full the event is dropped and the
/// consumer is expected to resynchronise with [`crate::SnapshotStore::get_snapshot`].
#[derive(Debug, Clone)]
pub struct ChannelPort {
    sender: mpsc::Sender<StoreEvent>,
}

impl ChannelPort {
    /// Create a port and the receiver that drains it.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StoreEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }
}

impl WatchPort for ChannelPort {
    fn deliver(&self, event: &StoreEvent) -> Delivery {
        match self.sender.try_send(event.clone()) {
            Ok(()) => Delivery::Delivered,
            Err(mpsc::error::TrySendError::Full(_)) => {
                trace!(node = %event.node(), "port channel full, skipping event");
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}
