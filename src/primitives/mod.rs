//! Low-level primitives for building the storage engine.

/// Byte-level utilities and encoding/decoding.
///
/// Fixed-width big-endian accessors and in-place range moves over raw buffers.
pub mod bytes;
