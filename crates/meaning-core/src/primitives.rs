//! # Engine Primitives
//!
//! Hardcoded runtime constants for the Meaning engine.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// Magic bytes for the Meaning binary store header.
///
/// - File Header = Magic Bytes ("MEAN") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"MEAN";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum depth of a type-path, and of any walk over the store tree.
///
/// Schema traversal fails with a recursion error before exceeding it, and
/// store walks stop descending at this depth.
pub const MAX_PATH_DEPTH: usize = 64;

/// Maximum length of a single literal value.
///
/// Values longer than this (64KB) are rejected when creating values.
pub const MAX_VALUE_LENGTH: usize = 65536;

/// Maximum number of values in one search request.
pub const MAX_SEARCH_VALUES: usize = 256;

/// Default record number for single-row fields.
pub const DEFAULT_RECORD_NUMBER: usize = 0;
