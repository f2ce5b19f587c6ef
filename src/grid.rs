//! Grid arithmetic: mapping byte counts to size classes.
//!
//! Every small request is rounded up to a multiple of [`ALIGN`] and served
//! from the free list of the matching size class. The two functions here are
//! pure and total over their documented domain; nothing in this module
//! touches memory.

/// Grid quantum: every served small block is a multiple of this many bytes.
pub const ALIGN: usize = 8;

/// Largest request served from the pool; above this, delegate to the backing
/// allocator.
pub const MAX_BYTES: usize = 128;

/// Number of size classes, one per multiple of [`ALIGN`] up to [`MAX_BYTES`].
pub const FREELISTS: usize = MAX_BYTES / ALIGN;

/// Desired batch size when refilling a free list from the chunk allocator.
pub const DEFAULT_REFILL_BLOCKS: usize = 20;

/// Rounds `bytes` up to the next multiple of [`ALIGN`].
///
/// `round_up(0)` is `0`; callers that need "at least one byte" should clamp
/// before calling this (see [`crate::pool::Pool::allocate`]).
pub const fn round_up(bytes: usize) -> usize {
    (bytes + ALIGN - 1) / ALIGN * ALIGN
}

/// Returns the size-class index holding blocks of size `round_up(bytes)`.
///
/// # Panics
/// Debug builds assert `1 <= bytes <= MAX_BYTES`; release builds compute a
/// garbage-but-safe index for out-of-range input (callers are required by
/// the module contract to pre-filter the large path before reaching here).
pub fn freelist_index(bytes: usize) -> usize {
    debug_assert!(bytes >= 1, "freelist_index: bytes must be >= 1");
    debug_assert!(
        bytes <= MAX_BYTES,
        "freelist_index: bytes must be <= MAX_BYTES"
    );
    (bytes + ALIGN - 1) / ALIGN - 1
}

/// Returns the size in bytes of size class `index` (`0..FREELISTS`).
pub const fn class_size(index: usize) -> usize {
    (index + 1) * ALIGN
}
