//! # snapstore
//!
//! Node-scoped, versioned configuration snapshot store for xDS control planes.
//!
//! Clients identify themselves by a node key and subscribe to typed resource
//! collections (clusters, listeners, routes, endpoints, secrets, scoped
//! routes). The store holds one immutable, versioned snapshot per node; the
//! mutation engine derives and publishes the next snapshot; watches wake
//! exactly when the version a subscriber holds is superseded.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use snapstore::prelude::*;
//!
//! let store = Arc::new(ShardedStore::new());
//! let engine = MutationEngine::new(Arc::clone(&store));
//!
//! engine.apply(MutationRequest::add("node-1", "1", TypeUrl::CLUSTER, "c1"))?;
//!
//! let snapshot = store.get_snapshot(&NodeKey::new("node-1")).unwrap();
//! assert_eq!(snapshot.version(), "1");
//! assert!(snapshot.contains(ResourceType::Cluster, "c1"));
//! # Ok::<(), StoreError>(())
//! ```
//!
//! ## Architecture
//!
//! This library is organized into several crates:
//!
//! - `snapstore-core` - Node keys, versions, resource types, errors
//! - `snapstore-cache` - Snapshot store with watch notifications
//! - `snapstore-engine` - Replace/Add/Update/Remove mutation engine
//!
//! This crate (`snapstore`) re-exports all public APIs for convenience.
//!
//! ## Design Principles
//!
//! 1. **No panics in library code** - All errors are returned as `Result`
//! 2. **No locks held across await points** - Per-node locks are synchronous and short
//! 3. **Whole-snapshot publication** - Readers never see a half-applied mutation
//! 4. **Observable** - `tracing` spans and `metrics` counters throughout

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Re-export all sub-crates
pub use snapstore_cache as cache;
pub use snapstore_core as core;
pub use snapstore_engine as engine;

/// Prelude module for convenient imports.
///
/// ```rust
/// use snapstore::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use snapstore_core::payload::TypedPayload;
    pub use snapstore_core::{NodeKey, Resource, ResourceType, StoreError, TypeUrl, Version};

    // Store types
    pub use snapstore_cache::{
        ChannelPort, ResourceCollection, ShardedStore, Snapshot, SnapshotBuilder, SnapshotStore,
        StoreEvent, StoreStats, Watch, WatchEvent, WatchOutcome, WatchPort,
    };

    // Engine types
    pub use snapstore_engine::{
        AddPolicy, ClearRequest, EngineConfig, MutationEngine, MutationReceipt, MutationRequest,
        MutationResponse, PayloadSynthesizer, TemplateSynthesizer, UnknownTypePolicy,
        WatchRequest,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("snapstore {} (MSRV {})", VERSION, MSRV)
    }
}
