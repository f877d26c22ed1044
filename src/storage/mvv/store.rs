use crate::primitives::bytes::shift;
use crate::types::{MvvError, Result, VersionHandle};

use super::codec::{
    assert_capacity, checked_end, is_array_mvv, overhead_length, records, write_record_header,
    Occupancy, LENGTH_PER_VERSION, LENGTH_TYPE_MVV, MAX_VALUE_LENGTH, PRIMORDIAL_VALUE_VERSION,
    TYPE_MVV, UNDEFINED_VALUE_LENGTH,
};

/// Bit set in [`StoreOutcome::packed`] when the version already existed.
pub const STORE_EXISTED_MASK: u32 = 0x8000_0000;
/// Bits of [`StoreOutcome::packed`] holding the new occupancy length.
pub const STORE_LENGTH_MASK: u32 = 0x7FFF_FFFF;

/// Result of [`store_version`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StoreOutcome {
    /// New occupancy length of the slot.
    pub length: usize,
    /// Whether a record for the version handle was already present.
    pub existed: bool,
}

impl StoreOutcome {
    /// Packs length and flag into one integer.
    pub fn packed(self) -> u32 {
        let length = (self.length as u32) & STORE_LENGTH_MASK;
        if self.existed {
            length | STORE_EXISTED_MASK
        } else {
            length
        }
    }

    /// Inverse of [`StoreOutcome::packed`].
    pub fn from_packed(packed: u32) -> Self {
        Self {
            length: (packed & STORE_LENGTH_MASK) as usize,
            existed: packed & STORE_EXISTED_MASK != 0,
        }
    }
}

/// Stores `source` as the value of `version` in the slot at `target[target_offset..]`.
///
/// Whatever the slot held before (nothing, an undefined value, a primordial value
/// or an MVV array), the result is an MVV array. An existing record for `version`
/// is overwritten in place when the new value has the same length, and otherwise
/// removed and re-appended at the end.
///
/// No byte of `target` at or beyond `target_limit` is ever written. Every failure
/// is detected before the first byte changes, so an error leaves the slot intact.
/// Size the slot beforehand with [`super::exact_required_length`].
pub fn store_version(
    target: &mut [u8],
    target_offset: usize,
    target_len: Occupancy,
    target_limit: usize,
    version: VersionHandle,
    source: &[u8],
) -> Result<StoreOutcome> {
    if target_limit > target.len() {
        return Err(MvvError::Invalid("target limit exceeds target buffer length"));
    }
    if source.len() > MAX_VALUE_LENGTH {
        return Err(MvvError::Invalid("value longer than a version record can hold"));
    }
    let mut existed = false;
    let mut to = target_offset;
    match target_len {
        Occupancy::Unused => {
            assert_capacity(target_limit, target_offset + overhead_length(1) + source.len())?;
            target[to] = TYPE_MVV;
            to += LENGTH_TYPE_MVV;
        }
        Occupancy::Undefined | Occupancy::Bytes(0) => {
            assert_capacity(target_limit, target_offset + overhead_length(2) + source.len())?;
            target[to] = TYPE_MVV;
            to += LENGTH_TYPE_MVV;
            to += write_record_header(target, to, PRIMORDIAL_VALUE_VERSION, UNDEFINED_VALUE_LENGTH);
        }
        Occupancy::Bytes(len) if !is_array_mvv(target, target_offset, len) => {
            if len > MAX_VALUE_LENGTH {
                return Err(MvvError::Invalid(
                    "primordial value longer than a version record can hold",
                ));
            }
            assert_capacity(
                target_limit,
                target_offset + overhead_length(2) + len + source.len(),
            )?;
            shift::shift_right(target, to, to + len, overhead_length(1));
            target[to] = TYPE_MVV;
            to += LENGTH_TYPE_MVV;
            to += write_record_header(target, to, PRIMORDIAL_VALUE_VERSION, len);
            to += len;
        }
        Occupancy::Bytes(len) => {
            let mut end = checked_end(target, target_offset, len)?;
            let mut existing = None;
            for record in records(target, target_offset, len)? {
                let record = record?;
                if record.version == version {
                    existing = Some(record);
                }
            }
            if let Some(record) = existing {
                existed = true;
                if record.value_len == source.len() {
                    target[record.value_start()..record.end()].copy_from_slice(source);
                    return Ok(StoreOutcome {
                        length: len,
                        existed,
                    });
                }
                assert_capacity(
                    target_limit,
                    end - record.total_len() + LENGTH_PER_VERSION + source.len(),
                )?;
                shift::shift_left(target, record.at, end, record.total_len());
                end -= record.total_len();
            }
            to = end;
        }
    }
    assert_capacity(target_limit, to + LENGTH_PER_VERSION + source.len())?;
    to += write_record_header(target, to, version, source.len());
    target[to..to + source.len()].copy_from_slice(source);
    to += source.len();
    Ok(StoreOutcome {
        length: to - target_offset,
        existed,
    })
}
