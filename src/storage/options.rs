use std::fmt;
use std::sync::Arc;

use super::metrics::{default_metrics, MvvMetrics};

/// Configuration for a prune pass over one MVV array.
#[derive(Clone)]
pub struct PruneOptions {
    /// Whether an array left with at most one version should collapse to a
    /// primordial value (or tombstone). Callers about to store a new version
    /// into the same slot usually disable this.
    pub convert_to_primordial: bool,
    /// Metrics sink notified about pruning activity.
    pub metrics: Arc<dyn MvvMetrics>,
}

impl PruneOptions {
    /// Creates options with default settings.
    pub fn new() -> Self {
        Self {
            convert_to_primordial: true,
            metrics: default_metrics(),
        }
    }

    /// Enables or disables conversion back to a primordial value.
    pub fn convert_to_primordial(mut self, enabled: bool) -> Self {
        self.convert_to_primordial = enabled;
        self
    }

    /// Sets the metrics collection implementation.
    pub fn metrics(mut self, metrics: Arc<dyn MvvMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

impl Default for PruneOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PruneOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PruneOptions")
            .field("convert_to_primordial", &self.convert_to_primordial)
            .finish_non_exhaustive()
    }
}
