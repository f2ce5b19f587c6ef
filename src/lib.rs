//! A small-object pool allocator that sits in front of a backing heap.
//!
//! This crate provides [`Pool`], a segregated-free-list allocator tuned for
//! many small, short-lived allocations (1 to [`MAX_BYTES`] bytes). Requests
//! in that range are rounded up to a multiple of [`ALIGN`] and served from
//! one of [`FREELISTS`] per-size free lists; those free lists are refilled in
//! batches carved out of a contiguous reserve, which itself grows from a
//! backing allocator whenever it runs dry. Requests above `MAX_BYTES` are
//! forwarded unchanged to the backing allocator.
//!
//! # Usage
//! Install a pool as the process's global allocator:
//! ```no_run
//! #[global_allocator]
//! static ALLOCATOR: stypool::Pool = stypool::Pool::new();
//! ```
//! or use one directly:
//! ```
//! let pool = stypool::Pool::new();
//! let ptr = pool.allocate(24);
//! pool.release(ptr, 24);
//! ```
//!
//! # Design
//! The pool never returns a null pointer from [`Pool::allocate`]: on
//! irrecoverable exhaustion it terminates the process instead (see the
//! [`oom`] module). There is no per-allocation header anywhere in the small
//! path — a free block's own first word *is* its free-list link, and an
//! allocated block's bytes are entirely the caller's. Consequently
//! [`Pool::release`] (and the `dealloc` half of the `GlobalAlloc` adapter)
//! must be given back the exact size the matching `allocate`/`alloc` call
//! used, exactly as `GlobalAlloc::dealloc` requires the original `Layout`.
//!
//! See the modules below for the four cooperating mechanisms, leaves-first:
//! [`grid`] (pure size-class arithmetic), [`free_list`] (the segregated
//! stacks), [`chunk`] (the reserve and its escalation protocol — the hardest
//! part of the crate), and [`pool`] (the public façade tying them together).
//! [`system`] abstracts "the backing allocator" and [`alloc_api`] adapts
//! [`Pool`] to [`core::alloc::GlobalAlloc`].
#![cfg_attr(not(feature = "std"), no_std)]

mod alloc_api;
mod chunk;
mod free_list;
mod grid;
pub mod oom;
mod pool;
pub mod system;

pub use grid::{ALIGN, DEFAULT_REFILL_BLOCKS, FREELISTS, MAX_BYTES};
pub use oom::OOM_EXIT_CODE;
pub use pool::{DefaultSystem, Pool};

/// A process-wide default pool, backed by the process heap.
///
/// This is the same `Pool` type `#[global_allocator]` installs; it is exposed
/// directly too, so code that wants pool-allocated small objects without
/// replacing the process's allocator can call `stypool::GLOBAL.allocate(..)`
/// and `stypool::GLOBAL.release(..)` instead.
#[cfg(feature = "std")]
pub static GLOBAL: Pool = Pool::new();
