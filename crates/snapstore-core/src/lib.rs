//! # snapstore-core
//!
//! Core types and error handling for the snapstore snapshot store.
//!
//! This crate provides the foundational types used across the other crates:
//!
//! - [`StoreError`] - Error taxonomy with gRPC status code mapping
//! - [`NodeKey`] - Opaque node group identifier
//! - [`Version`] - Opaque snapshot version tag
//! - [`ResourceType`] - The fixed set of resource categories and their type URLs
//! - [`Resource`] - A named, typed, opaque payload
//! - [`payload`] - Typed payload messages used to validate and synthesize resources
//!
//! ## Example
//!
//! ```rust
//! use snapstore_core::{NodeKey, ResourceType, Version};
//!
//! let node = NodeKey::new("my-envoy-group");
//! let version = Version::new("1");
//!
//! assert_eq!(ResourceType::ALL.len(), 6);
//! assert!(!version.is_empty());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod node;
pub mod payload;
mod resource;
mod resource_type;
mod version;

pub use error::StoreError;
pub use node::{NodeKey, NodeKeyHasher};
pub use resource::Resource;
pub use resource_type::{ResourceType, TypeUrl};
pub use version::Version;

/// Result type alias using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
