//! Inbound request and response types.
//!
//! These mirror what an RPC or CLI adapter hands the engine: every mutation
//! names a node and the version the resulting snapshot is published under.

use std::sync::Arc;

use prost_types::Any;
use snapstore_cache::Snapshot;
use snapstore_core::{NodeKey, StoreError, Version};

/// One of the four mutation families.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Swap in a whole new resource set.
    Replace {
        /// Type-tagged payloads, bucketed by their tag.
        resources: Vec<Any>,
    },
    /// Add one synthesized resource.
    Add {
        /// Type tag of the resource.
        type_url: String,
        /// Resource name.
        name: String,
    },
    /// Refresh the payload of one resource.
    Update {
        /// Type tag of the resource.
        type_url: String,
        /// Resource name.
        name: String,
    },
    /// Drop one resource.
    Remove {
        /// Type tag of the resource.
        type_url: String,
        /// Resource name.
        name: String,
    },
}

impl Mutation {
    /// Operation label used in logs and metrics.
    pub fn op(&self) -> &'static str {
        match self {
            Self::Replace { .. } => "replace",
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Remove { .. } => "remove",
        }
    }
}

/// A mutation addressed to a node.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    /// Target node.
    pub node: NodeKey,
    /// Version of the snapshot the mutation publishes.
    pub version: Version,
    /// What to do.
    pub mutation: Mutation,
}

impl MutationRequest {
    /// Create a Replace request.
    pub fn replace(
        node: impl Into<NodeKey>,
        version: impl Into<Version>,
        resources: Vec<Any>,
    ) -> Self {
        Self {
            node: node.into(),
            version: version.into(),
            mutation: Mutation::Replace { resources },
        }
    }

    /// Create an Add request.
    pub fn add(
        node: impl Into<NodeKey>,
        version: impl Into<Version>,
        type_url: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            version: version.into(),
            mutation: Mutation::Add {
                type_url: type_url.into(),
                name: name.into(),
            },
        }
    }

    /// Create an Update request.
    pub fn update(
        node: impl Into<NodeKey>,
        version: impl Into<Version>,
        type_url: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            version: version.into(),
            mutation: Mutation::Update {
                type_url: type_url.into(),
                name: name.into(),
            },
        }
    }

    /// Create a Remove request.
    pub fn remove(
        node: impl Into<NodeKey>,
        version: impl Into<Version>,
        type_url: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            version: version.into(),
            mutation: Mutation::Remove {
                type_url: type_url.into(),
                name: name.into(),
            },
        }
    }
}

/// Drop a node's snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearRequest {
    /// Target node.
    pub node: NodeKey,
}

impl ClearRequest {
    /// Create a clear request.
    pub fn new(node: impl Into<NodeKey>) -> Self {
        Self { node: node.into() }
    }
}

/// Subscribe to a node's next version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRequest {
    /// Node to watch.
    pub node: NodeKey,
    /// Version the subscriber already has, if any.
    pub last_known: Option<Version>,
}

impl WatchRequest {
    /// Watch for the first snapshot, or the current one if it exists.
    pub fn new(node: impl Into<NodeKey>) -> Self {
        Self {
            node: node.into(),
            last_known: None,
        }
    }

    /// Only resolve for a version other than `version`.
    pub fn after(mut self, version: impl Into<Version>) -> Self {
        self.last_known = Some(version.into());
        self
    }
}

/// Result of a successful mutation.
#[derive(Debug, Clone)]
pub struct MutationReceipt {
    /// Node the mutation applied to.
    pub node: NodeKey,
    /// The published snapshot.
    pub snapshot: Arc<Snapshot>,
    /// Whether the resource set differs from the previous snapshot's.
    pub changed: bool,
    /// Resources Replace skipped because their type was not recognised.
    pub dropped: usize,
}

impl MutationReceipt {
    /// Version the snapshot was published under.
    pub fn version(&self) -> &Version {
        self.snapshot.version()
    }
}

/// Wire form of a mutation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationResponse {
    /// Whether the snapshot was published.
    pub success: bool,
    /// Failure reason, when not successful.
    pub failure: Option<MutationFailure>,
}

/// Structured failure reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationFailure {
    /// Machine-readable error kind, e.g. `already_exists`.
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl From<&StoreError> for MutationFailure {
    fn from(err: &StoreError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<&Result<MutationReceipt, StoreError>> for MutationResponse {
    fn from(result: &Result<MutationReceipt, StoreError>) -> Self {
        match result {
            Ok(_) => Self {
                success: true,
                failure: None,
            },
            Err(err) => Self {
                success: false,
                failure: Some(err.into()),
            },
        }
    }
}

impl From<Result<MutationReceipt, StoreError>> for MutationResponse {
    fn from(result: Result<MutationReceipt, StoreError>) -> Self {
        Self::from(&result)
    }
}
