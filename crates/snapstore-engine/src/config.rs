//! Engine configuration.

/// What Add does when the `(type, name)` is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddPolicy {
    /// Fail with `AlreadyExists` and keep the current snapshot.
    #[default]
    Reject,
    /// Replace the existing resource (last write wins).
    Overwrite,
}

/// What Replace does with a resource whose type tag is not recognised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownTypePolicy {
    /// Drop the resource with a warning and keep going.
    #[default]
    Skip,
    /// Fail the whole request with `UnknownResourceType`.
    Reject,
}

/// Configuration for the mutation engine.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Duplicate handling for Add.
    pub add_policy: AddPolicy,
    /// Unknown type handling for Replace.
    pub unknown_type_policy: UnknownTypePolicy,
}

impl EngineConfig {
    /// Configuration that rejects every questionable input.
    pub fn strict() -> Self {
        Self {
            add_policy: AddPolicy::Reject,
            unknown_type_policy: UnknownTypePolicy::Reject,
        }
    }
}
