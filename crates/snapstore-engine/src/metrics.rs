//! Prometheus metrics for the mutation engine.
//!
//! Counters are emitted through the `metrics` facade; nothing is recorded
//! unless the host process installs a recorder.
//!
//! - `snapstore_mutations_total{op, outcome}` - one per mutation request
//! - `snapstore_dropped_resources_total{type_url}` - resources skipped by Replace
//! - `snapstore_clears_total{outcome}` - clear requests

use metrics::counter;

/// Outcome label for a successful mutation.
pub const OUTCOME_SUCCESS: &str = "success";

/// Metrics for the mutation engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineMetrics;

impl EngineMetrics {
    /// Create a new metrics handle.
    pub fn new() -> Self {
        Self
    }

    /// Record a finished mutation. `outcome` is [`OUTCOME_SUCCESS`] or an error kind.
    pub fn record_mutation(&self, op: &'static str, outcome: &'static str) {
        counter!("snapstore_mutations_total", "op" => op, "outcome" => outcome).increment(1);
    }

    /// Record a resource dropped because its type tag is unknown.
    pub fn record_dropped(&self, type_url: &str) {
        counter!("snapstore_dropped_resources_total", "type_url" => type_url.to_string())
            .increment(1);
    }

    /// Record a clear request.
    pub fn record_clear(&self, existed: bool) {
        let outcome = if existed { "cleared" } else { "absent" };
        counter!("snapstore_clears_total", "outcome" => outcome).increment(1);
    }
}
