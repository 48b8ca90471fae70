//! # Configuration Constants
//!
//! This module centralizes all configuration constants, grouping interdependent
//! values together and documenting their relationships. Constants that depend
//! on each other are co-located to prevent mismatch bugs.
//!
//! ## Dependency Graph
//!
//! ```text
//! PACKED_HEADER_SIZE (10 bytes)
//!       │
//!       ├─> PackedHeader struct (must have the same size_of; const-asserted)
//!       │
//!       └─> minimum blob size = PACKED_HEADER_SIZE + 1 (terminator byte)
//!
//! PACKED_BIG_PREVLEN (254)
//!       │
//!       ├─> prevlen field width: 1 byte below, 5 bytes at or above
//!       │
//!       └─> PACKED_END (255) must stay above it; 254 and 255 are both
//!           unavailable as 1-byte prevlen values
//!
//! DICT_INITIAL_SIZE (4)
//!       │
//!       ├─> must be a power of two (bucket masks are size - 1)
//!       │
//!       └─> DICT_FORCE_RESIZE_RATIO (5)
//!             Growth fires at used >= size when resizing is enabled, and at
//!             used >= size * ratio even when it is disabled.
//!
//! INTSET_HEADER_SIZE (8 bytes)
//!       │
//!       └─> IntSetHeader struct (same size_of; const-asserted)
//! ```
//!
//! ## Usage
//!
//! Import constants from this module rather than defining them locally:
//!
//! ```ignore
//! use crate::config::{PACKED_END, DICT_INITIAL_SIZE};
//! ```

// ============================================================================
// BYTE BUFFER CONFIGURATION
// ============================================================================

/// Preallocation cap for [`crate::bytebuf::ByteBuf`] growth, in bytes (1MB).
/// Below this payload size the buffer doubles on growth; above it, growth is
/// linear in steps of this value.
pub const BYTEBUF_PREALLOC_CAP: usize = 1024 * 1024;

// ============================================================================
// PACKED LIST LAYOUT CONSTANTS
// These define the wire format; changing any of them breaks persisted blobs
// ============================================================================

/// Size of the packed-list blob header: total_bytes (u32) + tail_offset (u32)
/// + count (u16), all little-endian.
pub const PACKED_HEADER_SIZE: usize = 10;

/// Terminator byte closing every packed-list blob.
pub const PACKED_END: u8 = 0xFF;

/// First byte of a 5-byte prevlen field. A 1-byte prevlen can therefore only
/// hold values below this marker.
pub const PACKED_BIG_PREVLEN: u8 = 0xFE;

/// The entry counter in the header saturates here; beyond it the true entry
/// count requires a walk of the blob.
pub const PACKED_COUNT_SATURATED: u16 = u16::MAX;

/// Longest byte slice that is even considered for integer coercion on insert.
pub const PACKED_INT_PARSE_MAX: usize = 32;

const _: () = assert!(
    PACKED_BIG_PREVLEN < PACKED_END,
    "the 5-byte prevlen marker must not collide with the terminator"
);

// ============================================================================
// INTEGER SET LAYOUT CONSTANTS
// ============================================================================

/// Size of the integer-set blob header: encoding (u32) + length (u32),
/// little-endian.
pub const INTSET_HEADER_SIZE: usize = 8;

// ============================================================================
// DICTIONARY SIZING
// These control growth, shrink, and the incremental-rehash duty cycle
// ============================================================================

/// Initial (and minimum) bucket-array size of every hash table.
/// Must be a power of two: bucket selection is `hash & (size - 1)`.
pub const DICT_INITIAL_SIZE: usize = 4;

/// Load factor at which growth is forced even when resizing is disabled.
/// With resizing enabled, growth already fires at a load factor of 1.
pub const DICT_FORCE_RESIZE_RATIO: usize = 5;

/// Shrink trigger: `resize_to_minimal` only acts when the table is below
/// 1/DICT_SHRINK_RATIO full.
pub const DICT_SHRINK_RATIO: usize = 10;

/// A single rehash step visiting `n` buckets gives up after skipping
/// `n * REHASH_EMPTY_VISITS_PER_STEP` empty buckets, to bound the pause a
/// step can introduce into a foreground operation.
pub const REHASH_EMPTY_VISITS_PER_STEP: usize = 10;

/// Bucket batch between clock checks in the time-bounded rehash helper.
pub const REHASH_BATCH_BUCKETS: usize = 100;

/// Largest permitted bucket-array size: the highest power of two that fits
/// in half the address space.
pub const DICT_MAX_SIZE: usize = (usize::MAX >> 2) + 1;

const _: () = assert!(
    DICT_INITIAL_SIZE.is_power_of_two(),
    "bucket masks require power-of-two table sizes"
);

const _: () = assert!(
    DICT_MAX_SIZE.is_power_of_two(),
    "the size cap itself must be a reachable power of two"
);
