//! Mark/sweep compaction of an MVV array.
//!
//! The first pass asks the visibility oracle about every record and sets the mark
//! bit on the ones some reader may still need. The second pass either collapses
//! the array to a primordial value (or tombstone) or squeezes out the unmarked
//! records and clears the marks on the survivors.

use tracing::{debug, trace, warn};

use crate::primitives::bytes::shift;
use crate::storage::oracle::{CommitStatus, VisibilityOracle, UNCOMMITTED};
use crate::storage::options::PruneOptions;
use crate::types::{MvvError, Result, Timestamp, VersionHandle};

use super::codec::{
    checked_end, get_length, is_array_mvv, is_marked, mark, read_record, unmark,
    LENGTH_PER_VERSION, LENGTH_TYPE_MVV, TYPE_ANTIVALUE, TYPE_MVV,
};

#[derive(Debug, Default)]
struct MarkPlan {
    versions: usize,
    marked: usize,
    aborted: usize,
    primordial: bool,
}

impl MarkPlan {
    fn keep(&mut self, bytes: &mut [u8], at: usize) {
        if !is_marked(bytes, at) {
            mark(bytes, at);
            self.marked += 1;
        }
    }
}

/// Removes versions of the MVV array at `bytes[offset..offset + length]` that no
/// past, present or future reader can observe, rewriting the array in place.
///
/// Returns the new length, which never exceeds `length`. A buffer that is not an
/// MVV array is left alone and `length` is returned. On error the array is left
/// logically unchanged: marks set during the pass are cleared before returning.
/// Versions of aborted transactions reported to the oracle before the failure
/// stay reported.
pub fn prune<O: VisibilityOracle + ?Sized>(
    bytes: &mut [u8],
    offset: usize,
    length: usize,
    oracle: &O,
    options: &PruneOptions,
) -> Result<usize> {
    if !is_array_mvv(bytes, offset, length) {
        return Ok(length);
    }
    let end = checked_end(bytes, offset, length)?;
    let plan = match mark_versions(bytes, offset, end, oracle, options.convert_to_primordial) {
        Ok(plan) => plan,
        Err(err) => {
            clear_marks(bytes, offset, end);
            warn!(offset, length, error = %err, "mvv.prune.rollback");
            options.metrics.prune_failed();
            return Err(err);
        }
    };
    if plan.aborted > 0 {
        options.metrics.aborted_reclaimed(plan.aborted);
    }

    let collapsed = plan.primordial && plan.marked <= 1 && survivor_is_plain(bytes, offset, end);
    let (new_length, versions_after) = if collapsed {
        if plan.marked == 1 {
            options.metrics.converted_to_primordial();
        } else {
            options.metrics.tombstoned();
        }
        (collapse(bytes, offset, end), 0)
    } else {
        (compact(bytes, offset, end), plan.marked)
    };
    options
        .metrics
        .prune_completed(plan.versions, versions_after, length - new_length);
    debug!(
        offset,
        length,
        new_length,
        versions = plan.versions,
        kept = plan.marked,
        aborted = plan.aborted,
        collapsed,
        "mvv.prune.done"
    );
    Ok(new_length)
}

/// Shorthand for [`prune`] with default options except the conversion flag.
pub fn prune_with<O: VisibilityOracle + ?Sized>(
    bytes: &mut [u8],
    offset: usize,
    length: usize,
    oracle: &O,
    convert_to_primordial: bool,
) -> Result<usize> {
    let options = PruneOptions::new().convert_to_primordial(convert_to_primordial);
    prune(bytes, offset, length, oracle, &options)
}

fn mark_versions<O: VisibilityOracle + ?Sized>(
    bytes: &mut [u8],
    offset: usize,
    end: usize,
    oracle: &O,
    convert_to_primordial: bool,
) -> Result<MarkPlan> {
    let mut plan = MarkPlan {
        primordial: convert_to_primordial,
        ..MarkPlan::default()
    };
    // Newest committed version seen so far that has not been marked yet.
    let mut last_committed: Option<(usize, VersionHandle)> = None;
    let mut uncommitted_ts: Option<Timestamp> = None;
    let mut at = offset + LENGTH_TYPE_MVV;
    while at < end {
        let record = read_record(bytes, at, end)?;
        plan.versions += 1;
        match oracle.commit_status(record.version, UNCOMMITTED, 0)? {
            CommitStatus::Uncommitted => {
                let ts = record.version.ts();
                if uncommitted_ts.is_some_and(|seen| seen != ts) {
                    return Err(MvvError::Corruption(format!(
                        "multiple uncommitted transactions in MVV at {at}"
                    )));
                }
                uncommitted_ts = Some(ts);
                plan.keep(bytes, at);
                // The writer may still abort, exposing the previous committed value.
                if let Some((last_at, _)) = last_committed.take() {
                    plan.keep(bytes, last_at);
                }
                plan.primordial = false;
                trace!(version = %record.version, "mvv.prune.keep_uncommitted");
            }
            CommitStatus::Committed(tc) => {
                if let Some((last_at, last_version)) = last_committed {
                    if oracle.has_concurrent_transaction(last_version.ts(), record.version.ts())? {
                        plan.keep(bytes, last_at);
                        plan.primordial = false;
                        trace!(version = %last_version, "mvv.prune.keep_concurrent");
                    }
                }
                last_committed = Some((at, record.version));
                trace!(version = %record.version, tc, "mvv.prune.committed");
            }
            CommitStatus::Aborted => {
                oracle.decrement_mvv_count(record.version)?;
                plan.aborted += 1;
                trace!(version = %record.version, "mvv.prune.drop_aborted");
            }
        }
        at = record.end();
    }
    if let Some((last_at, last_version)) = last_committed {
        plan.keep(bytes, last_at);
        if oracle.has_concurrent_transaction(0, last_version.ts())? {
            plan.primordial = false;
        }
    }
    Ok(plan)
}

/// Whether the only marked record (if any) can stand alone as a primordial value.
///
/// A value starting with the MVV tag, or equal to the lone tombstone byte, would
/// be misread once the array framing is gone.
fn survivor_is_plain(bytes: &[u8], offset: usize, end: usize) -> bool {
    let mut at = offset + LENGTH_TYPE_MVV;
    while at < end {
        let len = get_length(bytes, at);
        let value_start = at + LENGTH_PER_VERSION;
        if is_marked(bytes, at) {
            let value = &bytes[value_start..value_start + len];
            return value.first() != Some(&TYPE_MVV) && value != [TYPE_ANTIVALUE];
        }
        at = value_start + len;
    }
    true
}

/// Replaces the array with the value of its only marked record, or with the
/// tombstone byte when nothing is marked.
fn collapse(bytes: &mut [u8], offset: usize, end: usize) -> usize {
    let mut at = offset + LENGTH_TYPE_MVV;
    while at < end {
        let len = get_length(bytes, at);
        let value_start = at + LENGTH_PER_VERSION;
        if is_marked(bytes, at) {
            unmark(bytes, at);
            shift::move_range(bytes, value_start..value_start + len, offset);
            return len;
        }
        at = value_start + len;
    }
    bytes[offset] = TYPE_ANTIVALUE;
    1
}

/// Slides every marked record down over the unmarked ones, clearing marks.
fn compact(bytes: &mut [u8], offset: usize, end: usize) -> usize {
    let mut at = offset + LENGTH_TYPE_MVV;
    let mut to = at;
    while at < end {
        let record_end = at + LENGTH_PER_VERSION + get_length(bytes, at);
        if is_marked(bytes, at) {
            unmark(bytes, at);
            let moved = shift::move_range(bytes, at..record_end, to);
            to = moved.end;
        }
        at = record_end;
    }
    to - offset
}

/// Clears every mark bit reachable from the start of the array.
///
/// Stops quietly at the first record that does not fit, so it is safe on a
/// buffer already known to be corrupt.
fn clear_marks(bytes: &mut [u8], offset: usize, end: usize) {
    let mut at = offset + LENGTH_TYPE_MVV;
    while at + LENGTH_PER_VERSION <= end {
        unmark(bytes, at);
        at += LENGTH_PER_VERSION + get_length(bytes, at);
    }
}
