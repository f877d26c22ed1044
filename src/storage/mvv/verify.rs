use rustc_hash::FxHashSet;

use crate::types::{MvvError, Result};

use super::codec::{checked_end, is_array_mvv, records, Occupancy, TYPE_ANTIVALUE};

/// Shape of a slot as seen by [`verify_mvv`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MvvReport {
    /// Number of versions held; one for primordial and undefined slots.
    pub versions: usize,
    /// Sum of all value lengths.
    pub value_bytes: usize,
    /// Whether the slot holds a primordial (non-MVV) value.
    pub primordial: bool,
    /// Whether the slot holds only the anti-value tombstone.
    pub tombstone: bool,
}

/// Checks the structural invariants of the slot at `bytes[offset..]`.
///
/// Fails with [`MvvError::Corruption`] when records overrun the declared length,
/// when a mark bit survived a prune, or when a version handle appears twice.
pub fn verify_mvv(bytes: &[u8], offset: usize, occupancy: Occupancy) -> Result<MvvReport> {
    let len = match occupancy {
        Occupancy::Unused => return Ok(MvvReport::default()),
        Occupancy::Undefined | Occupancy::Bytes(0) => {
            return Ok(MvvReport {
                versions: 1,
                primordial: true,
                ..MvvReport::default()
            })
        }
        Occupancy::Bytes(len) => len,
    };
    checked_end(bytes, offset, len)?;
    if !is_array_mvv(bytes, offset, len) {
        return Ok(MvvReport {
            versions: 1,
            value_bytes: len,
            primordial: true,
            tombstone: len == 1 && bytes[offset] == TYPE_ANTIVALUE,
        });
    }
    let mut report = MvvReport::default();
    let mut seen = FxHashSet::default();
    for record in records(bytes, offset, len)? {
        let record = record?;
        if record.marked {
            return Err(MvvError::Corruption(format!(
                "mark bit left on version {} at {}",
                record.version, record.at
            )));
        }
        if !seen.insert(record.version) {
            return Err(MvvError::Corruption(format!(
                "version {} stored twice (second at {})",
                record.version, record.at
            )));
        }
        report.versions += 1;
        report.value_bytes += record.value_len;
    }
    Ok(report)
}
