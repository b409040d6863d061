//! Node identification for per-node snapshots.
//!
//! This module provides [`NodeKey`], the opaque identifier of a logical group
//! of clients sharing one configuration view. Keys are cheap to clone and are
//! hashed with FNV-1a when used as map keys.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fnv::FnvHasher;

/// Hasher builder used for node-keyed maps.
pub type NodeKeyHasher = fnv::FnvBuildHasher;

/// Opaque identifier for a node group.
///
/// # Example
///
/// ```rust
/// use snapstore_core::NodeKey;
///
/// let a = NodeKey::new("envoy-node-1");
/// let b = NodeKey::from("envoy-node-1");
///
/// assert_eq!(a, b);
/// assert_eq!(a.fingerprint(), b.fingerprint());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(Arc<str>);

impl NodeKey {
    /// Create a node key from any string.
    #[must_use]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// FNV-1a fingerprint of the key, stable across processes.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = FnvHasher::default();
        self.0.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({:?})", &*self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Borrow<str> for NodeKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NodeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
