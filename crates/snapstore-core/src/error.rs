//! Error types for snapshot store operations.
//!
//! This module provides [`StoreError`], the error type shared by the store,
//! the mutation engine, and any RPC adapter that fronts them. Every variant
//! converts into a [`tonic::Status`] so adapters can surface structured
//! failures without re-classifying them.

/// Error type for snapshot store and mutation operations.
///
/// A failed mutation never publishes anything: the node's previous snapshot
/// stays current whatever variant is returned.
///
/// # Example
///
/// ```rust
/// use snapstore_core::{ResourceType, StoreError};
///
/// fn reject_empty(name: &str) -> Result<(), StoreError> {
///     if name.is_empty() {
///         return Err(StoreError::MalformedResource {
///             type_url: ResourceType::Cluster.type_url().to_string(),
///             name: name.to_string(),
///             reason: "resource name cannot be empty".to_string(),
///         });
///     }
///     Ok(())
/// }
///
/// assert!(reject_empty("").is_err());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The node has no snapshot (never set, or cleared).
    #[error("no snapshot for node {node}")]
    NotFound {
        /// The node key that was looked up.
        node: String,
    },

    /// A resource with the same type and name already exists.
    #[error("resource already exists: {type_url}/{name}")]
    AlreadyExists {
        /// Type tag of the conflicting resource.
        type_url: String,
        /// Name of the conflicting resource.
        name: String,
    },

    /// A payload could not be interpreted as a resource of its declared type.
    #[error("malformed resource {type_url}/{name}: {reason}")]
    MalformedResource {
        /// Declared type tag.
        type_url: String,
        /// Resource name, empty when it could not be decoded.
        name: String,
        /// Why decoding failed.
        reason: String,
    },

    /// The type tag is not one of the known resource types.
    #[error("unknown resource type: {type_url}")]
    UnknownResourceType {
        /// The unrecognized type tag.
        type_url: String,
    },

    /// Invalid builder or engine configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Create a [`StoreError::MalformedResource`] from a prost decode failure.
    pub fn malformed(
        type_url: impl Into<String>,
        name: impl Into<String>,
        source: impl std::fmt::Display,
    ) -> Self {
        Self::MalformedResource {
            type_url: type_url.into(),
            name: name.into(),
            reason: source.to_string(),
        }
    }

    /// Create a [`StoreError::UnknownResourceType`].
    pub fn unknown_type(type_url: impl Into<String>) -> Self {
        Self::UnknownResourceType {
            type_url: type_url.into(),
        }
    }

    /// Short, stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::MalformedResource { .. } => "malformed_resource",
            Self::UnknownResourceType { .. } => "unknown_resource_type",
            Self::Configuration(_) => "configuration",
        }
    }
}

/// Convert to tonic::Status for gRPC responses.
impl From<StoreError> for tonic::Status {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { .. } => tonic::Status::not_found(err.to_string()),
            StoreError::AlreadyExists { .. } => tonic::Status::already_exists(err.to_string()),
            StoreError::MalformedResource { .. } | StoreError::UnknownResourceType { .. } => {
                tonic::Status::invalid_argument(err.to_string())
            }
            StoreError::Configuration(_) => tonic::Status::failed_precondition(err.to_string()),
        }
    }
}
