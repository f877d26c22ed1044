#![forbid(unsafe_code)]
//! Encoding and buffer utilities shared across storage layers.

pub mod ord {
    //! Big-endian fixed-width encoders used by on-page formats.

    use core::convert::TryInto;

    const U64_LEN: usize = core::mem::size_of::<u64>();
    const U16_LEN: usize = core::mem::size_of::<u16>();

    /// Writes a u64 in big-endian byte order at the start of `dst`.
    pub fn put_u64_be(dst: &mut [u8], v: u64) {
        assert!(dst.len() >= U64_LEN, "destination too small");
        dst[..U64_LEN].copy_from_slice(&v.to_be_bytes());
    }

    /// Decodes a u64 from big-endian byte order.
    pub fn get_u64_be(src: &[u8]) -> u64 {
        let head = src
            .get(..U64_LEN)
            .unwrap_or_else(|| panic!("u64 source shorter than 8 bytes (have {})", src.len()));
        let mut bytes = [0u8; U64_LEN];
        bytes.copy_from_slice(head);
        u64::from_be_bytes(bytes)
    }

    /// Writes a u16 in big-endian byte order at the start of `dst`.
    pub fn put_u16_be(dst: &mut [u8], v: u16) {
        assert!(dst.len() >= U16_LEN, "destination too small");
        dst[..U16_LEN].copy_from_slice(&v.to_be_bytes());
    }

    /// Decodes a u16 from big-endian byte order.
    pub fn get_u16_be(src: &[u8]) -> u16 {
        let head: [u8; U16_LEN] = src
            .get(..U16_LEN)
            .and_then(|h| h.try_into().ok())
            .unwrap_or_else(|| panic!("u16 source shorter than 2 bytes (have {})", src.len()));
        u16::from_be_bytes(head)
    }
}

pub mod shift {
    //! In-place moves of byte ranges inside one buffer.
    //!
    //! Source and destination may overlap in either direction; the copy always
    //! behaves as if the source were first copied to a temporary.

    use core::ops::Range;

    /// Moves `src` so that it starts at `dst`, returning the destination range.
    ///
    /// Panics when either range falls outside `buf`.
    pub fn move_range(buf: &mut [u8], src: Range<usize>, dst: usize) -> Range<usize> {
        let len = src.end - src.start;
        assert!(
            src.end <= buf.len() && dst + len <= buf.len(),
            "move out of bounds: {:?} -> {} in {} bytes",
            src,
            dst,
            buf.len()
        );
        if len > 0 && src.start != dst {
            buf.copy_within(src, dst);
        }
        dst..dst + len
    }

    /// Opens a gap of `by` bytes at `at` by shifting `buf[at..end]` right.
    pub fn shift_right(buf: &mut [u8], at: usize, end: usize, by: usize) {
        move_range(buf, at..end, at + by);
    }

    /// Closes the gap `buf[at..at + by]` by shifting `buf[at + by..end]` left.
    pub fn shift_left(buf: &mut [u8], at: usize, end: usize, by: usize) {
        move_range(buf, at + by..end, at);
    }
}
