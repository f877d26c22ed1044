use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Trait for tracking MVV pruning activity.
///
/// Implementations receive one callback per notable event during a prune pass.
/// The information can be used for monitoring how much space version history
/// consumes and how often slots collapse back to plain values.
pub trait MvvMetrics: Send + Sync {
    /// Records a completed prune of an MVV array.
    ///
    /// # Parameters
    /// * `versions_before` - Records present when the pass started.
    /// * `versions_after` - Records retained; zero after conversion to a plain value.
    /// * `bytes_reclaimed` - Difference between the input and output lengths.
    fn prune_completed(&self, versions_before: usize, versions_after: usize, bytes_reclaimed: usize);

    /// Records versions dropped because their writer aborted.
    fn aborted_reclaimed(&self, count: usize);

    /// Records an MVV array collapsing to a primordial value.
    fn converted_to_primordial(&self);

    /// Records an MVV array collapsing to the anti-value tombstone.
    fn tombstoned(&self);

    /// Records a prune pass that failed and rolled back its marks.
    fn prune_failed(&self);
}

/// A no-op implementation of [`MvvMetrics`] that discards all recorded metrics.
#[derive(Default)]
pub struct NoopMetrics;

impl MvvMetrics for NoopMetrics {
    fn prune_completed(&self, _before: usize, _after: usize, _bytes: usize) {}
    fn aborted_reclaimed(&self, _count: usize) {}
    fn converted_to_primordial(&self) {}
    fn tombstoned(&self) {}
    fn prune_failed(&self) {}
}

/// A thread-safe counter-based implementation of [`MvvMetrics`].
///
/// All counters use relaxed atomics and can be read from any thread.
#[derive(Default)]
pub struct CounterMetrics {
    /// Number of completed prune passes.
    pub prunes: AtomicU64,

    /// Number of records removed across all passes.
    pub versions_pruned: AtomicU64,

    /// Number of bytes returned to the page across all passes.
    pub bytes_reclaimed: AtomicU64,

    /// Number of records removed because their writer aborted.
    pub aborted_reclaimed: AtomicU64,

    /// Number of arrays collapsed to a primordial value.
    pub primordial_conversions: AtomicU64,

    /// Number of arrays collapsed to a tombstone.
    pub tombstones: AtomicU64,

    /// Number of failed prune passes.
    pub prune_failures: AtomicU64,
}

impl MvvMetrics for CounterMetrics {
    fn prune_completed(&self, versions_before: usize, versions_after: usize, bytes_reclaimed: usize) {
        self.prunes.fetch_add(1, Ordering::Relaxed);
        self.versions_pruned.fetch_add(
            versions_before.saturating_sub(versions_after) as u64,
            Ordering::Relaxed,
        );
        self.bytes_reclaimed
            .fetch_add(bytes_reclaimed as u64, Ordering::Relaxed);
    }

    fn aborted_reclaimed(&self, count: usize) {
        self.aborted_reclaimed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn converted_to_primordial(&self) {
        self.primordial_conversions.fetch_add(1, Ordering::Relaxed);
    }

    fn tombstoned(&self) {
        self.tombstones.fetch_add(1, Ordering::Relaxed);
    }

    fn prune_failed(&self) {
        self.prune_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Returns the default metrics implementation wrapped in an [`Arc`].
///
/// The default implementation is [`NoopMetrics`], which discards everything.
pub fn default_metrics() -> Arc<dyn MvvMetrics> {
    Arc::new(NoopMetrics)
}
