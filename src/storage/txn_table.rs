use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::storage::oracle::{CommitStatus, OracleResult, VisibilityOracle, UNCOMMITTED};
use crate::types::{MvvError, OracleError, Result, Timestamp, VersionHandle};

/// Lifecycle state of a transaction tracked by [`TxnTable`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxnState {
    /// Started and neither committed nor aborted.
    Running,
    /// Committed at the given timestamp.
    Committed(Timestamp),
    /// Rolled back.
    Aborted,
}

#[derive(Clone, Debug)]
struct TxnEntry {
    state: TxnState,
    mvv_count: u32,
}

#[derive(Debug, Default)]
struct TxnTableInner {
    txns: BTreeMap<Timestamp, TxnEntry>,
    fail_next: Option<OracleError>,
}

/// In-memory transaction table implementing [`VisibilityOracle`].
///
/// Transactions are keyed by start timestamp. Each tracks how many MVV records
/// it still owns so the engine can tell when no page refers to it anymore.
/// Transactions the table has never seen are treated as committed long ago.
#[derive(Debug, Default)]
pub struct TxnTable {
    inner: Mutex<TxnTableInner>,
}

impl TxnTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a running transaction that started at `ts`.
    pub fn begin(&self, ts: Timestamp) -> Result<()> {
        if ts == 0 || ts > VersionHandle::MAX_TS {
            return Err(MvvError::Invalid("transaction timestamp out of range"));
        }
        let mut inner = self.inner.lock();
        if inner.txns.contains_key(&ts) {
            return Err(MvvError::Invalid("transaction already registered"));
        }
        inner.txns.insert(
            ts,
            TxnEntry {
                state: TxnState::Running,
                mvv_count: 0,
            },
        );
        Ok(())
    }

    /// Marks the transaction started at `ts` as committed at `tc`.
    pub fn commit(&self, ts: Timestamp, tc: Timestamp) -> Result<()> {
        if tc < ts {
            return Err(MvvError::Invalid("commit timestamp precedes start"));
        }
        self.finish(ts, TxnState::Committed(tc))
    }

    /// Marks the transaction started at `ts` as aborted.
    pub fn abort(&self, ts: Timestamp) -> Result<()> {
        self.finish(ts, TxnState::Aborted)
    }

    fn finish(&self, ts: Timestamp, state: TxnState) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .txns
            .get_mut(&ts)
            .ok_or(MvvError::Invalid("unknown transaction"))?;
        if entry.state != TxnState::Running {
            return Err(MvvError::Invalid("transaction already finished"));
        }
        entry.state = state;
        Ok(())
    }

    /// Counts one more MVV record written by `version`'s transaction.
    pub fn record_mvv(&self, version: VersionHandle) -> Result<()> {
        let mut inner = self.inner.lock();
        let entry = inner
            .txns
            .get_mut(&version.ts())
            .ok_or(MvvError::Invalid("unknown transaction"))?;
        entry.mvv_count = entry.mvv_count.saturating_add(1);
        Ok(())
    }

    /// Returns the number of MVV records still owned by the transaction at `ts`.
    pub fn mvv_count(&self, ts: Timestamp) -> Option<u32> {
        self.inner.lock().txns.get(&ts).map(|entry| entry.mvv_count)
    }

    /// Returns the state of the transaction started at `ts`.
    pub fn state(&self, ts: Timestamp) -> Option<TxnState> {
        self.inner.lock().txns.get(&ts).map(|entry| entry.state)
    }

    /// Number of running transactions.
    pub fn active_count(&self) -> usize {
        self.inner
            .lock()
            .txns
            .values()
            .filter(|entry| entry.state == TxnState::Running)
            .count()
    }

    /// Drops aborted transactions that no longer own MVV records.
    ///
    /// Returns how many entries were removed.
    pub fn release_aborted(&self) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.txns.len();
        inner
            .txns
            .retain(|_, entry| !(entry.state == TxnState::Aborted && entry.mvv_count == 0));
        before - inner.txns.len()
    }

    /// Makes the next oracle call fail with `err`.
    pub fn fail_next(&self, err: OracleError) {
        self.inner.lock().fail_next = Some(err);
    }

    fn take_failure(inner: &mut TxnTableInner) -> OracleResult<()> {
        match inner.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl VisibilityOracle for TxnTable {
    /// Steps are ignored: the table has no notion of a reader inside the writer.
    fn commit_status(
        &self,
        version: VersionHandle,
        since: Timestamp,
        _step: u8,
    ) -> OracleResult<CommitStatus> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner)?;
        if version.is_primordial() {
            return Ok(CommitStatus::Committed(0));
        }
        let status = match inner.txns.get(&version.ts()).map(|entry| entry.state) {
            None => CommitStatus::Committed(version.ts()),
            Some(TxnState::Running) => CommitStatus::Uncommitted,
            Some(TxnState::Aborted) => CommitStatus::Aborted,
            Some(TxnState::Committed(tc)) if tc <= since => CommitStatus::Committed(tc),
            Some(TxnState::Committed(_)) => CommitStatus::Uncommitted,
        };
        Ok(status)
    }

    fn has_concurrent_transaction(&self, ts1: Timestamp, ts2: Timestamp) -> OracleResult<bool> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner)?;
        if ts2 <= ts1.saturating_add(1) {
            return Ok(false);
        }
        Ok(inner
            .txns
            .range(ts1 + 1..ts2)
            .any(|(_, entry)| entry.state == TxnState::Running))
    }

    fn decrement_mvv_count(&self, version: VersionHandle) -> OracleResult<()> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner)?;
        if let Some(entry) = inner.txns.get_mut(&version.ts()) {
            entry.mvv_count = entry.mvv_count.saturating_sub(1);
        }
        Ok(())
    }
}
