#![forbid(unsafe_code)]
//! Shared identifiers and the crate error type.

use std::fmt;

/// Transaction start timestamp handed out by the transaction engine.
pub type Timestamp = u64;

/// Opaque 64-bit version identifier stored in front of every MVV record.
///
/// The upper 56 bits carry the start timestamp of the owning transaction and the
/// low 8 bits a step counter within that transaction. Zero denotes the primordial
/// version, i.e. the value that existed before any multi-version history.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct VersionHandle(pub u64);

impl VersionHandle {
    /// Handle of the implicit version held by a primordial value.
    pub const PRIMORDIAL: VersionHandle = VersionHandle(0);

    const STEP_BITS: u32 = 8;
    const STEP_MASK: u64 = (1 << Self::STEP_BITS) - 1;

    /// Largest start timestamp a handle can carry.
    pub const MAX_TS: Timestamp = u64::MAX >> Self::STEP_BITS;

    /// Builds a handle from a transaction start timestamp and a step number.
    ///
    /// `ts` must not exceed [`VersionHandle::MAX_TS`].
    pub const fn new(ts: Timestamp, step: u8) -> Self {
        debug_assert!(ts <= Self::MAX_TS, "timestamp does not fit in 56 bits");
        Self((ts << Self::STEP_BITS) | step as u64)
    }

    /// Returns the raw 64-bit handle.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Start timestamp of the transaction that wrote this version.
    pub const fn ts(self) -> Timestamp {
        self.0 >> Self::STEP_BITS
    }

    /// Step number within the owning transaction.
    pub const fn step(self) -> u8 {
        (self.0 & Self::STEP_MASK) as u8
    }

    /// Returns `true` for the primordial handle.
    pub const fn is_primordial(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for VersionHandle {
    fn from(value: u64) -> Self {
        VersionHandle(value)
    }
}

impl From<VersionHandle> for u64 {
    fn from(value: VersionHandle) -> Self {
        value.0
    }
}

impl fmt::Display for VersionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ts(), self.step())
    }
}

/// Failures reported by the visibility oracle.
#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum OracleError {
    /// The calling thread was interrupted while waiting on transaction state.
    #[error("interrupted while waiting for transaction status")]
    Interrupted,
    /// A lock on transaction state could not be acquired in time.
    #[error("timed out after {waited_ms}ms waiting for transaction status")]
    Timeout {
        /// Time spent waiting before giving up.
        waited_ms: u64,
    },
}

/// Errors produced by MVV operations.
#[derive(thiserror::Error, Debug)]
pub enum MvvError {
    /// A write would pass the caller's ceiling or a fetch target is too small.
    #[error("capacity exceeded: need {needed} bytes, limit {limit}")]
    Capacity {
        /// Bytes (or end offset) the operation requires.
        needed: usize,
        /// Bytes (or end offset) the caller allows.
        limit: usize,
    },
    /// The caller broke the calling contract.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// The buffer does not follow the MVV layout.
    #[error("corrupt value: {0}")]
    Corruption(String),
    /// The visibility oracle failed while pruning.
    #[error("visibility oracle: {0}")]
    Oracle(#[from] OracleError),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MvvError>;
