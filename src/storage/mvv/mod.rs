//! Multi-version values packed into a single value slot.
//!
//! A slot moves through these shapes as transactions write and maintenance prunes:
//!
//! - unused (no key) and undefined (key without value) carry no bytes;
//! - a primordial value is the raw value bytes, read as version 0;
//! - an MVV array is a [`TYPE_MVV`] tag followed by version records;
//! - the anti-value tombstone is a lone [`TYPE_ANTIVALUE`] byte.
//!
//! The caller owns the buffer and must hold it exclusively while storing or
//! pruning. Readers may share an unmodified buffer.

pub mod codec;
mod fetch;
mod prune;
mod store;
mod verify;

pub use codec::{
    estimate_required_length, exact_required_length, is_array_mvv, overhead_length, Occupancy,
    RecordHeader, LENGTH_PER_VERSION, LENGTH_TYPE_MVV, LENGTH_VALUE_LENGTH, LENGTH_VERSION,
    MAX_VALUE_LENGTH, PRIMORDIAL_VALUE_VERSION, TYPE_ANTIVALUE, TYPE_MVV, UNDEFINED_VALUE_LENGTH,
};
pub use fetch::{
    fetch_version, fetch_version_by_offset, visit_all_versions, VersionList, VersionVisitor,
    VisitedVersion,
};
pub use prune::{prune, prune_with};
pub use store::{store_version, StoreOutcome, STORE_EXISTED_MASK, STORE_LENGTH_MASK};
pub use verify::{verify_mvv, MvvReport};
