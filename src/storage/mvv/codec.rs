//! Packed layout of a multi-version value and the accessors that read and write it.
//!
//! ```text
//! +------+----------------+-----------+---------+----------------+-----------+---------+--
//! | 0xFE | version (u64)  | len (u16) | value   | version (u64)  | len (u16) | value   | ...
//! +------+----------------+-----------+---------+----------------+-----------+---------+--
//! ```
//!
//! Integers are big-endian. The top bit of the length field is a transient mark
//! used by the pruner; every public operation leaves it cleared.

use crate::primitives::bytes::ord;
use crate::types::{MvvError, Result, VersionHandle};

/// Tag byte that starts every MVV array.
pub const TYPE_MVV: u8 = 0xFE;
/// Single-byte value left behind when pruning removes every version.
pub const TYPE_ANTIVALUE: u8 = 0xFD;

/// Version handle of the implicit version held by a primordial value.
pub const PRIMORDIAL_VALUE_VERSION: VersionHandle = VersionHandle::PRIMORDIAL;
/// Value length recorded for a primordial value that was undefined.
pub const UNDEFINED_VALUE_LENGTH: usize = 0;

/// Width of the tag byte.
pub const LENGTH_TYPE_MVV: usize = 1;
/// Width of a version handle.
pub const LENGTH_VERSION: usize = 8;
/// Width of the packed length + mark field.
pub const LENGTH_VALUE_LENGTH: usize = 2;
/// Per-record overhead preceding the value bytes.
pub const LENGTH_PER_VERSION: usize = LENGTH_VERSION + LENGTH_VALUE_LENGTH;
/// Longest value a single record can hold.
pub const MAX_VALUE_LENGTH: usize = 0x7FFF;

const MARK_BIT: u16 = 0x8000;
const LENGTH_MASK: u16 = 0x7FFF;

/// Occupancy of a value slot, tracked by the caller alongside the buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Occupancy {
    /// No key and no value.
    Unused,
    /// A key whose value is explicitly undefined.
    Undefined,
    /// Real bytes: a primordial value or an MVV array.
    Bytes(usize),
}

impl Occupancy {
    /// Decodes the signed length convention: negative, zero, positive.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            r if r < 0 => Occupancy::Unused,
            0 => Occupancy::Undefined,
            r => Occupancy::Bytes(r as usize),
        }
    }

    /// Encodes back into the signed length convention.
    pub fn raw(self) -> i64 {
        match self {
            Occupancy::Unused => -1,
            Occupancy::Undefined => 0,
            Occupancy::Bytes(len) => len as i64,
        }
    }

    /// Number of bytes in use; zero for unused and undefined slots.
    pub fn len(self) -> usize {
        match self {
            Occupancy::Bytes(len) => len,
            _ => 0,
        }
    }

    /// Returns `true` when no bytes are in use.
    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Returns the handle stored in the record starting at `at`.
pub fn get_version(bytes: &[u8], at: usize) -> VersionHandle {
    VersionHandle(ord::get_u64_be(&bytes[at..]))
}

/// Writes the handle of the record starting at `at`.
pub fn put_version(bytes: &mut [u8], at: usize, version: VersionHandle) {
    ord::put_u64_be(&mut bytes[at..], version.raw());
}

fn length_field(bytes: &[u8], at: usize) -> u16 {
    ord::get_u16_be(&bytes[at + LENGTH_VERSION..])
}

fn put_length_field(bytes: &mut [u8], at: usize, field: u16) {
    ord::put_u16_be(&mut bytes[at + LENGTH_VERSION..], field);
}

/// Returns the value length of the record starting at `at`, ignoring the mark.
pub fn get_length(bytes: &[u8], at: usize) -> usize {
    usize::from(length_field(bytes, at) & LENGTH_MASK)
}

/// Writes the value length of the record starting at `at` and clears its mark.
pub fn put_length(bytes: &mut [u8], at: usize, len: usize) {
    debug_assert!(len <= MAX_VALUE_LENGTH, "value length {len} exceeds field");
    put_length_field(bytes, at, len as u16 & LENGTH_MASK);
}

/// Returns `true` when the record starting at `at` carries the mark.
pub fn is_marked(bytes: &[u8], at: usize) -> bool {
    length_field(bytes, at) & MARK_BIT != 0
}

/// Sets the mark on the record starting at `at`.
pub fn mark(bytes: &mut [u8], at: usize) {
    let field = length_field(bytes, at);
    put_length_field(bytes, at, field | MARK_BIT);
}

/// Clears the mark on the record starting at `at`.
pub fn unmark(bytes: &mut [u8], at: usize) {
    let field = length_field(bytes, at);
    put_length_field(bytes, at, field & LENGTH_MASK);
}

/// Writes a record header (handle + length) at `at` and returns its width.
pub(crate) fn write_record_header(
    bytes: &mut [u8],
    at: usize,
    version: VersionHandle,
    len: usize,
) -> usize {
    put_version(bytes, at, version);
    put_length(bytes, at, len);
    LENGTH_PER_VERSION
}

/// Bytes of framing needed for an MVV array holding `versions` records.
pub const fn overhead_length(versions: usize) -> usize {
    LENGTH_TYPE_MVV + LENGTH_PER_VERSION * versions
}

/// Returns `true` when `bytes[offset..offset + length]` is an MVV array.
pub fn is_array_mvv(bytes: &[u8], offset: usize, length: usize) -> bool {
    length > 0 && bytes.get(offset) == Some(&TYPE_MVV)
}

/// Upper bound on the length needed to add a `new_len`-byte version.
///
/// Constant time; never less than [`exact_required_length`] for the same inputs.
pub fn estimate_required_length(
    bytes: &[u8],
    offset: usize,
    occupancy: Occupancy,
    new_len: usize,
) -> usize {
    match occupancy {
        Occupancy::Unused => overhead_length(1) + new_len,
        Occupancy::Bytes(len) if is_array_mvv(bytes, offset, len) => {
            len + LENGTH_PER_VERSION + new_len
        }
        other => overhead_length(2) + other.len() + new_len,
    }
}

/// Exact length the slot will occupy after storing `new_len` bytes under `version`.
///
/// Scans existing records so that replacing a version nets out its old value.
pub fn exact_required_length(
    bytes: &[u8],
    offset: usize,
    occupancy: Occupancy,
    version: VersionHandle,
    new_len: usize,
) -> Result<usize> {
    match occupancy {
        Occupancy::Bytes(len) if is_array_mvv(bytes, offset, len) => {
            for record in records(bytes, offset, len)? {
                let record = record?;
                if record.version == version {
                    return Ok(len - record.value_len + new_len);
                }
            }
            Ok(len + LENGTH_PER_VERSION + new_len)
        }
        other => Ok(estimate_required_length(bytes, offset, other, new_len)),
    }
}

/// Decoded header of one version record.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecordHeader {
    /// Offset of the record's first byte (the version handle).
    pub at: usize,
    /// Version handle.
    pub version: VersionHandle,
    /// Length of the value bytes.
    pub value_len: usize,
    /// State of the transient mark bit.
    pub marked: bool,
}

impl RecordHeader {
    /// Offset of the first value byte.
    pub fn value_start(&self) -> usize {
        self.at + LENGTH_PER_VERSION
    }

    /// Offset one past the last value byte.
    pub fn end(&self) -> usize {
        self.value_start() + self.value_len
    }

    /// Header plus value width.
    pub fn total_len(&self) -> usize {
        LENGTH_PER_VERSION + self.value_len
    }
}

/// Reads the record at `at`, requiring it to end at or before `end`.
pub fn read_record(bytes: &[u8], at: usize, end: usize) -> Result<RecordHeader> {
    if at + LENGTH_PER_VERSION > end {
        return Err(MvvError::Corruption(format!(
            "record header at {at} runs past end {end}"
        )));
    }
    let header = RecordHeader {
        at,
        version: get_version(bytes, at),
        value_len: get_length(bytes, at),
        marked: is_marked(bytes, at),
    };
    if header.end() > end {
        return Err(MvvError::Corruption(format!(
            "value of {} bytes at {} runs past end {end}",
            header.value_len,
            header.value_start()
        )));
    }
    Ok(header)
}

/// Iterates the records of the MVV array at `bytes[offset..offset + length]`.
///
/// Fails up front when the declared length runs past the buffer.
pub fn records(bytes: &[u8], offset: usize, length: usize) -> Result<Records<'_>> {
    let end = checked_end(bytes, offset, length)?;
    Ok(Records {
        bytes,
        at: offset + LENGTH_TYPE_MVV,
        end,
        failed: false,
    })
}

/// Iterator over record headers; yields one error and stops on corruption.
#[derive(Debug)]
pub struct Records<'a> {
    bytes: &'a [u8],
    at: usize,
    end: usize,
    failed: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<RecordHeader>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.at >= self.end {
            return None;
        }
        match read_record(self.bytes, self.at, self.end) {
            Ok(header) => {
                self.at = header.end();
                Some(Ok(header))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

/// Returns `offset + length`, rejecting ranges outside `bytes`.
pub(crate) fn checked_end(bytes: &[u8], offset: usize, length: usize) -> Result<usize> {
    match offset.checked_add(length) {
        Some(end) if end <= bytes.len() => Ok(end),
        _ => Err(MvvError::Invalid("declared length runs past the buffer")),
    }
}

pub(crate) fn assert_capacity(limit: usize, needed: usize) -> Result<()> {
    if needed > limit {
        return Err(MvvError::Capacity { needed, limit });
    }
    Ok(())
}
