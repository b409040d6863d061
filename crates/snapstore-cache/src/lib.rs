//! # snapstore-cache
//!
//! Versioned per-node snapshot store.
//!
//! This crate provides the storage layer the mutation engine and the
//! discovery layer share:
//!
//! - [`ShardedStore`] - DashMap-based concurrent store of node snapshots
//! - [`Snapshot`] - Immutable, versioned set of typed resource collections
//! - [`Watch`] - Subscription that resolves when a node's version changes
//! - [`WatchPort`] - Outbound interface for publication and removal events
//!
//! ## Key Design Decisions
//!
//! - Uses `DashMap` for sharded concurrent access; distinct nodes never
//!   contend beyond a shard lookup
//! - Writers on the same node are serialized by the node's own lock
//! - Snapshots are immutable and published by swapping an `Arc`
//! - Watches subscribe before comparing versions, so no publication is missed
//!
//! ## Example
//!
//! ```rust
//! use snapstore_cache::{ShardedStore, Snapshot, SnapshotStore};
//! use snapstore_core::NodeKey;
//!
//! let store = ShardedStore::new();
//! let node = NodeKey::new("node-1");
//!
//! store.set_snapshot(&node, Snapshot::builder().version("v1").build());
//! assert_eq!(store.get_snapshot(&node).unwrap().version(), "v1");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod port;
mod snapshot;
mod stats;
mod store;
mod watch;

pub use port::{ChannelPort, Delivery, StoreEvent, WatchPort};
pub use snapshot::{ResourceCollection, Snapshot, SnapshotBuilder};
pub use stats::StoreStats;
pub use store::{ShardedStore, SnapshotStore, StoreBuilder, StoreConfig};
pub use watch::{Watch, WatchEvent, WatchId, WatchOutcome};
