use tracing::warn;

use crate::types::{MvvError, Result, VersionHandle};

use super::codec::{
    assert_capacity, checked_end, get_length, is_array_mvv, read_record, records, Occupancy,
    LENGTH_PER_VERSION, LENGTH_TYPE_MVV, PRIMORDIAL_VALUE_VERSION, UNDEFINED_VALUE_LENGTH,
};

/// Copies the value stored for `version` into the front of `target`.
///
/// The slot is `source[source_offset..source_offset + source_len]`. A primordial
/// value satisfies only the primordial handle. Returns the value length, or
/// `None` when the slot holds no such version, in which case `target` is not
/// touched.
pub fn fetch_version(
    source: &[u8],
    source_offset: usize,
    source_len: usize,
    version: VersionHandle,
    target: &mut [u8],
) -> Result<Option<usize>> {
    let end = checked_end(source, source_offset, source_len)?;
    let found = if !is_array_mvv(source, source_offset, source_len) {
        (version == PRIMORDIAL_VALUE_VERSION).then_some(source_offset..end)
    } else {
        let mut found = None;
        for record in records(source, source_offset, source_len)? {
            let record = record?;
            if record.version == version {
                found = Some(record.value_start()..record.end());
                break;
            }
        }
        found
    };
    let Some(range) = found else {
        return Ok(None);
    };
    let len = range.len();
    if len > 0 {
        assert_capacity(target.len(), len)?;
        target[..len].copy_from_slice(&source[range]);
    }
    Ok(Some(len))
}

/// Copies the value starting at `offset` into the front of `target`.
///
/// `offset` is a `value_offset` reported by [`visit_all_versions`] over the same
/// `source` and `source_offset`. An offset equal to `source_offset` stands for a
/// primordial slot whose whole content is the value.
pub fn fetch_version_by_offset(
    source: &[u8],
    source_offset: usize,
    source_len: usize,
    offset: usize,
    target: &mut [u8],
) -> Result<usize> {
    let end = checked_end(source, source_offset, source_len)?;
    let first_value = source_offset + LENGTH_TYPE_MVV + LENGTH_PER_VERSION;
    if offset < source_offset || offset > end || (offset > source_offset && offset < first_value)
    {
        return Err(MvvError::Invalid("value offset out of range"));
    }
    let len = if offset == source_offset {
        source_len
    } else {
        get_length(source, offset - LENGTH_PER_VERSION)
    };
    if offset + len > end {
        return Err(MvvError::Corruption(format!(
            "value of {len} bytes at {offset} runs past end {end}"
        )));
    }
    if len > 0 {
        assert_capacity(target.len(), len)?;
        target[..len].copy_from_slice(&source[offset..offset + len]);
    }
    Ok(len)
}

/// Receives every version of a slot from [`visit_all_versions`].
pub trait VersionVisitor {
    /// Called once before the first version, so one visitor can be reused.
    fn init(&mut self) -> Result<()>;

    /// Called once for each version in storage order.
    ///
    /// `value_offset` indexes the buffer passed to [`visit_all_versions`].
    fn saw_version(
        &mut self,
        version: VersionHandle,
        value_offset: usize,
        value_len: usize,
    ) -> Result<()>;
}

/// Reports every version stored in the slot at `source[source_offset..]`.
///
/// An unused slot reports nothing; undefined and primordial slots report the
/// single primordial version. Visitor errors abort the walk and are returned.
pub fn visit_all_versions<V: VersionVisitor + ?Sized>(
    visitor: &mut V,
    source: &[u8],
    source_offset: usize,
    occupancy: Occupancy,
) -> Result<()> {
    visitor.init()?;
    match occupancy {
        Occupancy::Unused => Ok(()),
        Occupancy::Undefined | Occupancy::Bytes(0) => {
            visitor.saw_version(PRIMORDIAL_VALUE_VERSION, source_offset, UNDEFINED_VALUE_LENGTH)
        }
        Occupancy::Bytes(len) if !is_array_mvv(source, source_offset, len) => {
            checked_end(source, source_offset, len)?;
            visitor.saw_version(PRIMORDIAL_VALUE_VERSION, source_offset, len)
        }
        Occupancy::Bytes(len) => {
            let end = checked_end(source, source_offset, len)?;
            let mut at = source_offset + LENGTH_TYPE_MVV;
            while at < end {
                let record = read_record(source, at, end).map_err(|err| {
                    warn!(offset = source_offset, length = len, at, "mvv.visit.corrupt");
                    err
                })?;
                visitor.saw_version(record.version, record.value_start(), record.value_len)?;
                at = record.end();
            }
            Ok(())
        }
    }
}

/// One version reported to a [`VersionList`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VisitedVersion {
    /// Version handle.
    pub version: VersionHandle,
    /// Offset of the value bytes in the visited buffer.
    pub value_offset: usize,
    /// Length of the value bytes.
    pub value_len: usize,
}

/// Visitor that collects every reported version.
#[derive(Clone, Debug, Default)]
pub struct VersionList {
    /// Versions in storage order.
    pub versions: Vec<VisitedVersion>,
}

impl VersionVisitor for VersionList {
    fn init(&mut self) -> Result<()> {
        self.versions.clear();
        Ok(())
    }

    fn saw_version(
        &mut self,
        version: VersionHandle,
        value_offset: usize,
        value_len: usize,
    ) -> Result<()> {
        self.versions.push(VisitedVersion {
            version,
            value_offset,
            value_len,
        });
        Ok(())
    }
}
