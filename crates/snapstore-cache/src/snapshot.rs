//! Snapshot: immutable, versioned collection of resources.
//!
//! A snapshot represents a consistent view of all resources for a node
//! at a specific version. Snapshots are:
//!
//! - **Immutable**: Once built, a snapshot cannot be modified
//! - **Versioned**: Each snapshot carries a caller-supplied [`Version`]
//! - **Complete**: There is one [`ResourceCollection`] per [`ResourceType`],
//!   possibly empty
//!
//! Deriving the next snapshot goes through [`Snapshot::to_builder`], which
//! shares every collection with the source and copies a collection only when
//! the builder first writes to it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::Arc;

use snapstore_core::{Resource, ResourceType, StoreError, Version};

/// Name-indexed resources of a single type.
///
/// Iteration is ordered by resource name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCollection {
    resource_type: ResourceType,
    resources: BTreeMap<String, Arc<Resource>>,
}

impl ResourceCollection {
    /// Create an empty collection.
    pub fn new(resource_type: ResourceType) -> Self {
        Self {
            resource_type,
            resources: BTreeMap::new(),
        }
    }

    /// The type every entry in this collection has.
    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Get the number of resources.
    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if there are no resources.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Get a resource by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Arc<Resource>> {
        self.resources.get(name)
    }

    /// Check if a resource with this name exists.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Iterate over all resources in name order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.values()
    }

    /// Get all resource names in order.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    fn insert(&mut self, resource: Arc<Resource>) -> Option<Arc<Resource>> {
        debug_assert_eq!(resource.resource_type(), self.resource_type);
        self.resources.insert(resource.name().to_string(), resource)
    }

    fn remove(&mut self, name: &str) -> Option<Arc<Resource>> {
        self.resources.remove(name)
    }
}

/// An immutable snapshot of resources for a node.
///
/// Snapshots are the unit of publication: the store swaps the whole value,
/// so readers never observe a half-applied change.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Version tag supplied by the publisher.
    version: Version,
    /// One collection per resource type, indexed by [`ResourceType::index`].
    collections: [Arc<ResourceCollection>; ResourceType::COUNT],
}

impl Snapshot {
    /// Create a new snapshot builder.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// An empty snapshot with the given version.
    pub fn empty(version: impl Into<Version>) -> Self {
        SnapshotBuilder::new().version(version).build()
    }

    /// Start a builder holding this snapshot's resources.
    ///
    /// The version is carried over and is normally overridden.
    pub fn to_builder(&self) -> SnapshotBuilder {
        SnapshotBuilder {
            version: self.version.clone(),
            collections: self.collections.clone(),
        }
    }

    /// Get the version of this snapshot.
    #[inline]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Get the collection for a resource type.
    #[inline]
    pub fn resources(&self, resource_type: ResourceType) -> &ResourceCollection {
        &self.collections[resource_type.index()]
    }

    /// Look up a single resource.
    #[inline]
    pub fn get(&self, resource_type: ResourceType, name: &str) -> Option<&Arc<Resource>> {
        self.resources(resource_type).get(name)
    }

    /// Check if a resource exists.
    #[inline]
    pub fn contains(&self, resource_type: ResourceType, name: &str) -> bool {
        self.resources(resource_type).contains(name)
    }

    /// Iterate over all collections in [`ResourceType::ALL`] order.
    pub fn collections(&self) -> impl Iterator<Item = &ResourceCollection> {
        self.collections.iter().map(|c| &**c)
    }

    /// Get the total number of resources across all types.
    pub fn total_resources(&self) -> usize {
        self.collections.iter().map(|c| c.len()).sum()
    }

    /// Check if this snapshot holds no resources.
    pub fn is_empty(&self) -> bool {
        self.collections.iter().all(|c| c.is_empty())
    }

    /// The `(type, name)` identity of every resource.
    pub fn resource_keys(&self) -> BTreeSet<(ResourceType, String)> {
        self.collections()
            .flat_map(|c| c.names().map(move |n| (c.resource_type(), n.to_string())))
            .collect()
    }

    /// Compare resources with another snapshot, ignoring versions.
    pub fn same_resources(&self, other: &Snapshot) -> bool {
        self.collections
            .iter()
            .zip(other.collections.iter())
            .all(|(a, b)| Arc::ptr_eq(a, b) || a == b)
    }

    /// One-line listing of resource names per non-empty type.
    pub fn summary(&self) -> String {
        let mut out = format!("version={}", self.version);
        for collection in self.collections().filter(|c| !c.is_empty()) {
            let names: Vec<&str> = collection.names().collect();
            let _ = write!(out, " {}=[{}]", collection.resource_type(), names.join(","));
        }
        out
    }
}

/// Builder for creating snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    version: Version,
    collections: [Arc<ResourceCollection>; ResourceType::COUNT],
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBuilder {
    /// Create a new snapshot builder with empty collections.
    pub fn new() -> Self {
        Self {
            version: Version::default(),
            collections: ResourceType::ALL.map(|ty| Arc::new(ResourceCollection::new(ty))),
        }
    }

    /// Set the version for this snapshot.
    pub fn version(mut self, version: impl Into<Version>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a resource, replacing any resource with the same type and name.
    pub fn resource(mut self, resource: Resource) -> Self {
        self.upsert(resource);
        self
    }

    /// Add several resources, last one wins on name conflicts.
    pub fn resources(mut self, resources: impl IntoIterator<Item = Resource>) -> Self {
        for resource in resources {
            self.upsert(resource);
        }
        self
    }

    /// Look up a resource staged in the builder.
    pub fn get(&self, resource_type: ResourceType, name: &str) -> Option<&Arc<Resource>> {
        self.collections[resource_type.index()].get(name)
    }

    /// Insert a resource, rejecting a duplicate `(type, name)`.
    pub fn try_insert(&mut self, resource: Resource) -> Result<(), StoreError> {
        let resource_type = resource.resource_type();
        if self.collections[resource_type.index()].contains(resource.name()) {
            return Err(StoreError::AlreadyExists {
                type_url: resource_type.type_url().to_string(),
                name: resource.name().to_string(),
            });
        }
        self.upsert(resource);
        Ok(())
    }

    /// Insert or replace a resource, returning the previous one.
    pub fn upsert(&mut self, resource: Resource) -> Option<Arc<Resource>> {
        self.upsert_shared(Arc::new(resource))
    }

    /// Insert or replace an already shared resource.
    pub fn upsert_shared(&mut self, resource: Arc<Resource>) -> Option<Arc<Resource>> {
        let index = resource.resource_type().index();
        Arc::make_mut(&mut self.collections[index]).insert(resource)
    }

    /// Remove a resource, returning it if present.
    ///
    /// A missing resource leaves the collection shared with its source.
    pub fn remove(&mut self, resource_type: ResourceType, name: &str) -> Option<Arc<Resource>> {
        let slot = &mut self.collections[resource_type.index()];
        if !slot.contains(name) {
            return None;
        }
        Arc::make_mut(slot).remove(name)
    }

    /// Build the snapshot.
    pub fn build(self) -> Snapshot {
        Snapshot {
            version: self.version,
            collections: self.collections,
        }
    }
}
