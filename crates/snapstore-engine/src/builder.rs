//! Engine builder for configuring and creating the mutation engine.

use std::sync::Arc;

use snapstore_cache::ShardedStore;
use snapstore_core::{Result, StoreError};

use crate::config::{AddPolicy, EngineConfig, UnknownTypePolicy};
use crate::engine::MutationEngine;
use crate::synth::{PayloadSynthesizer, TemplateSynthesizer};

/// Builder for creating a [`MutationEngine`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use snapstore_cache::ShardedStore;
/// use snapstore_engine::{AddPolicy, MutationEngineBuilder};
///
/// let engine = MutationEngineBuilder::new()
///     .store(Arc::new(ShardedStore::new()))
///     .add_policy(AddPolicy::Overwrite)
///     .build()?;
/// assert_eq!(engine.config().add_policy, AddPolicy::Overwrite);
/// # Ok::<(), snapstore_core::StoreError>(())
/// ```
#[derive(Debug, Default)]
pub struct MutationEngineBuilder {
    store: Option<Arc<ShardedStore>>,
    synthesizer: Option<Arc<dyn PayloadSynthesizer>>,
    template: Option<TemplateSynthesizer>,
    config: EngineConfig,
}

impl MutationEngineBuilder {
    /// Create a new engine builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store to publish to.
    ///
    /// This is required.
    pub fn store(mut self, store: Arc<ShardedStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom payload synthesizer.
    pub fn synthesizer(mut self, synthesizer: Arc<dyn PayloadSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Use the template synthesizer with custom settings.
    pub fn template(mut self, template: TemplateSynthesizer) -> Self {
        self.template = Some(template);
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set how Add treats an occupied name.
    pub fn add_policy(mut self, policy: AddPolicy) -> Self {
        self.config.add_policy = policy;
        self
    }

    /// Set how Replace treats unknown type tags.
    pub fn unknown_type_policy(mut self, policy: UnknownTypePolicy) -> Self {
        self.config.unknown_type_policy = policy;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No store was provided
    /// - Both a custom synthesizer and a template were provided
    /// - The template fails validation
    pub fn build(self) -> Result<MutationEngine> {
        let store = self
            .store
            .ok_or_else(|| StoreError::Configuration("store is required".into()))?;

        let synthesizer: Arc<dyn PayloadSynthesizer> = match (self.synthesizer, self.template) {
            (Some(_), Some(_)) => {
                return Err(StoreError::Configuration(
                    "set either a synthesizer or a template, not both".into(),
                ))
            }
            (Some(custom), None) => custom,
            (None, template) => {
                let template = template.unwrap_or_default();
                template.validate()?;
                Arc::new(template)
            }
        };

        Ok(MutationEngine::from_parts(store, synthesizer, self.config))
    }
}
