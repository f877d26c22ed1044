//! Multi-version value (MVV) storage for an embedded transactional key-value store.
//!
//! A single value slot can hold several versions of the same logical value, one per
//! transaction, packed contiguously into one byte buffer. This crate encodes those
//! versions, fetches and enumerates them, and prunes the ones no reader can observe.

#![warn(missing_docs)]

pub mod primitives;
pub mod storage;
pub mod types;
