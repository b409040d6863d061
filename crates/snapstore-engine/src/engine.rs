//! The mutation engine.
//!
//! Every mutation reads the node's current snapshot (a missing snapshot is
//! treated as empty), derives the next snapshot, and publishes it under the
//! request's version. The read and the publish happen inside the node's
//! critical section, so concurrent mutations of one node never interleave.
//! A failed mutation publishes nothing.

use std::sync::Arc;

use prost_types::Any;
use snapstore_cache::{ShardedStore, Snapshot, SnapshotBuilder, SnapshotStore, Watch};
use snapstore_core::{NodeKey, Resource, ResourceType, StoreError, Version};
use tracing::{debug, info, instrument, warn, Span};

use crate::builder::MutationEngineBuilder;
use crate::config::{AddPolicy, EngineConfig, UnknownTypePolicy};
use crate::metrics::{EngineMetrics, OUTCOME_SUCCESS};
use crate::request::{ClearRequest, Mutation, MutationReceipt, MutationRequest, WatchRequest};
use crate::synth::{PayloadSynthesizer, TemplateSynthesizer};

/// Applies replace/add/update/remove mutations to a [`ShardedStore`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use snapstore_cache::ShardedStore;
/// use snapstore_core::{NodeKey, ResourceType};
/// use snapstore_engine::MutationEngine;
///
/// let engine = MutationEngine::new(Arc::new(ShardedStore::new()));
/// let node = NodeKey::new("n1");
///
/// let receipt = engine.add(&node, "1", ResourceType::Cluster, "c1")?;
/// assert_eq!(receipt.version(), "1");
/// assert!(receipt.snapshot.contains(ResourceType::Cluster, "c1"));
/// # Ok::<(), snapstore_core::StoreError>(())
/// ```
#[derive(Debug, Clone)]
pub struct MutationEngine {
    store: Arc<ShardedStore>,
    synthesizer: Arc<dyn PayloadSynthesizer>,
    config: EngineConfig,
    metrics: EngineMetrics,
}

impl MutationEngine {
    /// Create an engine with the default configuration and template synthesizer.
    pub fn new(store: Arc<ShardedStore>) -> Self {
        Self::from_parts(
            store,
            Arc::new(TemplateSynthesizer::default()),
            EngineConfig::default(),
        )
    }

    pub(crate) fn from_parts(
        store: Arc<ShardedStore>,
        synthesizer: Arc<dyn PayloadSynthesizer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            synthesizer,
            config,
            metrics: EngineMetrics::new(),
        }
    }

    /// Create an engine builder.
    pub fn builder() -> MutationEngineBuilder {
        MutationEngineBuilder::new()
    }

    /// The store mutations are published to.
    pub fn store(&self) -> &Arc<ShardedStore> {
        &self.store
    }

    /// Get the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Apply a wire-level mutation request.
    ///
    /// Type tags of Add, Update and Remove must name a known resource type.
    #[instrument(
        skip_all,
        fields(node = %request.node, version = %request.version, op = request.mutation.op())
    )]
    pub fn apply(&self, request: MutationRequest) -> Result<MutationReceipt, StoreError> {
        let MutationRequest {
            node,
            version,
            mutation,
        } = request;

        match mutation {
            Mutation::Replace { resources } => self.replace(&node, version, resources),
            Mutation::Add { type_url, name } => match type_url.parse::<ResourceType>() {
                Ok(ty) => self.add(&node, version, ty, &name),
                Err(err) => self.finish("add", Err(err)),
            },
            Mutation::Update { type_url, name } => match type_url.parse::<ResourceType>() {
                Ok(ty) => self.update(&node, version, ty, &name),
                Err(err) => self.finish("update", Err(err)),
            },
            Mutation::Remove { type_url, name } => match type_url.parse::<ResourceType>() {
                Ok(ty) => self.remove(&node, version, ty, &name),
                Err(err) => self.finish("remove", Err(err)),
            },
        }
    }

    /// Replace the node's whole resource set.
    ///
    /// Payloads are bucketed by their type tag. Unknown tags are skipped or
    /// rejected per [`UnknownTypePolicy`]; a payload that does not decode as
    /// its tagged type, or a repeated `(type, name)`, fails the request.
    #[instrument(skip_all, fields(node = %node, version = tracing::field::Empty))]
    pub fn replace(
        &self,
        node: &NodeKey,
        version: impl Into<Version>,
        resources: Vec<Any>,
    ) -> Result<MutationReceipt, StoreError> {
        let version = version.into();
        Span::current().record("version", version.as_str());

        let result = self.stage_replace(resources).map(|(staged, dropped)| {
            let snapshot = self.store.set_snapshot(node, staged.version(version).build());
            MutationReceipt {
                node: node.clone(),
                snapshot,
                changed: true,
                dropped,
            }
        });
        self.finish("replace", result)
    }

    /// Add one synthesized resource.
    #[instrument(
        skip_all,
        fields(node = %node, version = tracing::field::Empty, %resource_type, name)
    )]
    pub fn add(
        &self,
        node: &NodeKey,
        version: impl Into<Version>,
        resource_type: ResourceType,
        name: &str,
    ) -> Result<MutationReceipt, StoreError> {
        let version = version.into();
        Span::current().record("version", version.as_str());

        let result = self
            .synthesizer
            .synthesize(node, resource_type, name)
            .and_then(|resource| {
                self.derive(node, version, |builder| match self.config.add_policy {
                    AddPolicy::Reject => builder.try_insert(resource).map(|()| true),
                    AddPolicy::Overwrite => {
                        if builder.upsert(resource).is_some() {
                            debug!("overwrote existing resource");
                        }
                        Ok(true)
                    }
                })
            });
        self.finish("add", result)
    }

    /// Refresh the payload of the resource matching `(resource_type, name)`.
    ///
    /// Without a match the current resources are republished under the new
    /// version.
    #[instrument(
        skip_all,
        fields(node = %node, version = tracing::field::Empty, %resource_type, name)
    )]
    pub fn update(
        &self,
        node: &NodeKey,
        version: impl Into<Version>,
        resource_type: ResourceType,
        name: &str,
    ) -> Result<MutationReceipt, StoreError> {
        let version = version.into();
        Span::current().record("version", version.as_str());

        let result = self.derive(node, version, |builder| {
            let Some(current) = builder.get(resource_type, name).cloned() else {
                debug!("no matching resource, republishing unchanged");
                return Ok(false);
            };
            let refreshed = self.synthesizer.refresh(&current)?;
            if refreshed.resource_type() != resource_type || refreshed.name() != name {
                return Err(StoreError::malformed(
                    resource_type.type_url(),
                    name,
                    "refreshed payload changed the resource identity",
                ));
            }
            builder.upsert(refreshed);
            Ok(true)
        });
        self.finish("update", result)
    }

    /// Drop the resource matching `(resource_type, name)`. Missing is a no-op
    /// that still republishes under the new version.
    #[instrument(
        skip_all,
        fields(node = %node, version = tracing::field::Empty, %resource_type, name)
    )]
    pub fn remove(
        &self,
        node: &NodeKey,
        version: impl Into<Version>,
        resource_type: ResourceType,
        name: &str,
    ) -> Result<MutationReceipt, StoreError> {
        let version = version.into();
        Span::current().record("version", version.as_str());

        let result = self.derive(node, version, |builder| {
            let removed = builder.remove(resource_type, name).is_some();
            if !removed {
                debug!("no matching resource, republishing unchanged");
            }
            Ok(removed)
        });
        self.finish("remove", result)
    }

    /// Drop the node's snapshot. Returns whether one existed.
    #[instrument(skip_all, fields(node = %request.node))]
    pub fn clear(&self, request: &ClearRequest) -> bool {
        let existed = self.store.clear_snapshot(&request.node);
        self.metrics.record_clear(existed);
        if !existed {
            debug!("clear on node without snapshot");
        }
        existed
    }

    /// Register a watch on the store.
    pub fn watch(&self, request: &WatchRequest) -> Watch {
        self.store.watch(&request.node, request.last_known.as_ref())
    }

    /// Get the node's current snapshot.
    pub fn snapshot(&self, node: &NodeKey) -> Option<Arc<Snapshot>> {
        self.store.get_snapshot(node)
    }

    /// Read-modify-write the node's snapshot under its write lock.
    ///
    /// `edit` returns whether it changed the resource set.
    fn derive<F>(
        &self,
        node: &NodeKey,
        version: Version,
        edit: F,
    ) -> Result<MutationReceipt, StoreError>
    where
        F: FnOnce(&mut SnapshotBuilder) -> Result<bool, StoreError>,
    {
        let mut changed = false;
        let snapshot = self.store.modify(node, |current| {
            let mut builder = current.map(|s| s.to_builder()).unwrap_or_default();
            changed = edit(&mut builder)?;
            Ok::<_, StoreError>(builder.version(version).build())
        })?;

        Ok(MutationReceipt {
            node: node.clone(),
            snapshot,
            changed,
            dropped: 0,
        })
    }

    /// Decode and bucket a Replace payload list. Runs outside the node lock.
    fn stage_replace(&self, resources: Vec<Any>) -> Result<(SnapshotBuilder, usize), StoreError> {
        let mut staged = SnapshotBuilder::new();
        let mut dropped = 0;

        for any in &resources {
            match Resource::decode(any) {
                Ok(resource) => staged.try_insert(resource)?,
                Err(StoreError::UnknownResourceType { type_url })
                    if self.config.unknown_type_policy == UnknownTypePolicy::Skip =>
                {
                    warn!(type_url = %type_url, "dropping resource with unknown type");
                    self.metrics.record_dropped(&type_url);
                    dropped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        Ok((staged, dropped))
    }

    fn finish(
        &self,
        op: &'static str,
        result: Result<MutationReceipt, StoreError>,
    ) -> Result<MutationReceipt, StoreError> {
        match &result {
            Ok(receipt) => {
                self.metrics.record_mutation(op, OUTCOME_SUCCESS);
                info!(
                    op,
                    node = %receipt.node,
                    version = %receipt.version(),
                    changed = receipt.changed,
                    resources = receipt.snapshot.total_resources(),
                    "published snapshot"
                );
                debug!(snapshot = %receipt.snapshot.summary(), "new snapshot");
            }
            Err(err) => {
                self.metrics.record_mutation(op, err.kind());
                warn!(op, error = %err, "mutation rejected");
            }
        }
        result
    }
}
