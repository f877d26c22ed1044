//! Value-slot storage and the hooks it needs from the transaction engine.
//!
//! The [`mvv`] module owns the byte layout. Commit visibility comes from a
//! [`VisibilityOracle`]; [`TxnTable`] is the in-memory implementation used by
//! embedded callers and tests.

/// Multi-version value encoding, storing, pruning and reading.
pub mod mvv;

/// Transaction visibility interface consulted while pruning.
pub mod oracle;

mod metrics;
mod options;
mod txn_table;

pub use metrics::{default_metrics, CounterMetrics, MvvMetrics, NoopMetrics};
pub use options::PruneOptions;
pub use oracle::{CommitStatus, OracleResult, VisibilityOracle, UNCOMMITTED};
pub use txn_table::{TxnState, TxnTable};
