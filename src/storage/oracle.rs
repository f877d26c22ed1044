use std::sync::Arc;

use crate::types::{OracleError, Timestamp, VersionHandle};

/// Result alias for visibility oracle calls.
pub type OracleResult<T> = std::result::Result<T, OracleError>;

/// Reader timestamp meaning "as of now, after every commit".
pub const UNCOMMITTED: Timestamp = Timestamp::MAX;

/// Commit state of the transaction that wrote a version.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CommitStatus {
    /// The writer rolled back; its versions are garbage.
    Aborted,
    /// The writer is still running (or committed after the reader's timestamp).
    Uncommitted,
    /// The writer committed at the given timestamp.
    Committed(Timestamp),
}

/// Answers commit-status and concurrency questions about version handles.
///
/// Implemented by the transaction engine; the MVV pruner only consumes it.
/// Implementations must be callable through a shared reference because page
/// maintenance runs concurrently with transaction processing.
pub trait VisibilityOracle {
    /// Status of `version` as seen by a reader at timestamp `since`.
    ///
    /// `step` selects visibility of the reader's own earlier steps.
    fn commit_status(
        &self,
        version: VersionHandle,
        since: Timestamp,
        step: u8,
    ) -> OracleResult<CommitStatus>;

    /// Whether a live transaction could still read a version written at `ts1`
    /// in preference to one written at `ts2`.
    fn has_concurrent_transaction(&self, ts1: Timestamp, ts2: Timestamp) -> OracleResult<bool>;

    /// Notes that the storage of one version written by `version`'s transaction was reclaimed.
    fn decrement_mvv_count(&self, version: VersionHandle) -> OracleResult<()>;
}

impl<T: VisibilityOracle + ?Sized> VisibilityOracle for &T {
    fn commit_status(
        &self,
        version: VersionHandle,
        since: Timestamp,
        step: u8,
    ) -> OracleResult<CommitStatus> {
        (**self).commit_status(version, since, step)
    }

    fn has_concurrent_transaction(&self, ts1: Timestamp, ts2: Timestamp) -> OracleResult<bool> {
        (**self).has_concurrent_transaction(ts1, ts2)
    }

    fn decrement_mvv_count(&self, version: VersionHandle) -> OracleResult<()> {
        (**self).decrement_mvv_count(version)
    }
}

impl<T: VisibilityOracle + ?Sized> VisibilityOracle for Arc<T> {
    fn commit_status(
        &self,
        version: VersionHandle,
        since: Timestamp,
        step: u8,
    ) -> OracleResult<CommitStatus> {
        (**self).commit_status(version, since, step)
    }

    fn has_concurrent_transaction(&self, ts1: Timestamp, ts2: Timestamp) -> OracleResult<bool> {
        (**self).has_concurrent_transaction(ts1, ts2)
    }

    fn decrement_mvv_count(&self, version: VersionHandle) -> OracleResult<()> {
        (**self).decrement_mvv_count(version)
    }
}
