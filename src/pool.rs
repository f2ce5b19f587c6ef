//! The public allocate/release façade: dispatches small vs. large requests
//! and keeps the free lists topped up.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::chunk::{chunk_alloc, Reserve};
use crate::free_list::FreeList;
use crate::grid::{freelist_index, round_up, DEFAULT_REFILL_BLOCKS, FREELISTS, MAX_BYTES};
use crate::oom;
use crate::system::SystemAllocator;

#[cfg(feature = "std")]
use crate::system::System;

/// The mutable state of one pool: its reserve, its free lists, and the
/// running total of bytes pulled from the backing allocator.
struct PoolState {
    reserve: Reserve,
    free_lists: [FreeList; FREELISTS],
    total_used: usize,
}

impl PoolState {
    const fn new() -> Self {
        // `FreeList::new()` is `const`, but `[FreeList; N]: Default` is not
        // available in a `const fn`, so the array is built with a literal of
        // the right length instead of `core::array::from_fn` (which is not
        // `const`-callable here either).
        const EMPTY: FreeList = FreeList::new();
        Self {
            reserve: Reserve::new(),
            free_lists: [EMPTY; FREELISTS],
            total_used: 0,
        }
    }

    /// Obtains a batch of `size`-byte blocks from the chunk allocator,
    /// threads every surplus block onto free list `freelist_index(size)`,
    /// and returns the first block to the caller.
    fn refill<S: SystemAllocator>(&mut self, system: &S, size: usize) -> NonNull<u8> {
        let (first, served) = chunk_alloc(
            &mut self.reserve,
            &mut self.free_lists,
            &mut self.total_used,
            system,
            size,
            DEFAULT_REFILL_BLOCKS,
        );
        if served == 1 {
            return first;
        }

        // Thread blocks `1..served` onto the free list as a contiguous run:
        // block `k` is `first + k * size`, the surplus blocks are pushed in
        // descending order so the list ends up ordered ascending-by-address
        // (an implementation detail with no observable effect beyond test
        // determinism).
        let class = freelist_index(size);
        for k in (1..served).rev() {
            // SAFETY: `first + k * size` lies within the `served * size`
            // bytes `chunk_alloc` just carved out for this batch, and none
            // of those bytes are shared with anything else.
            let block = unsafe { NonNull::new_unchecked(first.as_ptr().add(k * size)) };
            unsafe { self.free_lists[class].push(block) };
        }
        first
    }
}

/// A small-object pool allocator.
///
/// Small requests (`1..=MAX_BYTES` after the zero-size rule below) are
/// served from segregated free lists backed by a contiguous reserve; larger
/// requests are forwarded unchanged to the backing allocator `S`. See the
/// crate-level documentation for the full design.
///
/// `Pool` does not implement `Drop`: its reserve and free-list blocks are
/// never returned to the backing allocator during its lifetime, by design
/// (see the crate-level "Open Questions" notes). Constructing many
/// short-lived pools will leak their backing memory.
pub struct Pool<S: SystemAllocator = DefaultSystem> {
    state: spin::Mutex<PoolState>,
    system: S,
}

#[cfg(feature = "std")]
/// The backing allocator `Pool` uses when none is specified: the process
/// heap, via `std::alloc::System`.
pub type DefaultSystem = System;

#[cfg(not(feature = "std"))]
#[doc(hidden)]
pub enum DefaultSystem {}
#[cfg(not(feature = "std"))]
impl SystemAllocator for DefaultSystem {
    fn alloc(&self, _bytes: usize) -> Option<NonNull<u8>> {
        match *self {}
    }
    fn dealloc(&self, _ptr: NonNull<u8>, _bytes: usize) {
        match *self {}
    }
}

#[cfg(feature = "std")]
impl Pool<System> {
    /// Creates a new, empty pool backed by the process heap.
    ///
    /// This is a `const fn`: a freshly constructed pool is valid and can be
    /// assigned directly to a `static`, exactly like
    /// `#[global_allocator] static ALLOCATOR: stypool::Pool = stypool::Pool::new();`.
    #[must_use = "assign the pool to a static and install it with #[global_allocator], or keep it alive and call allocate/release directly"]
    pub const fn new() -> Self {
        Self {
            state: spin::Mutex::new(PoolState::new()),
            system: System,
        }
    }
}

impl<S: SystemAllocator> Pool<S> {
    /// Creates a new, empty pool backed by a caller-supplied
    /// [`SystemAllocator`] (see [`crate::system::Backing`] to wrap an
    /// arbitrary `GlobalAlloc`).
    pub fn with_system(system: S) -> Self {
        Self {
            state: spin::Mutex::new(PoolState::new()),
            system,
        }
    }

    /// Allocates `bytes` bytes and returns a pointer to them.
    ///
    /// A request of `0` is treated as a request of `1` (never returns a
    /// pointer to nothing). A request larger than `MAX_BYTES` is forwarded to
    /// the backing allocator unchanged. This function never returns a
    /// dangling or null pointer: on irrecoverable exhaustion the process is
    /// terminated (see [`crate::oom`]).
    pub fn allocate(&self, bytes: usize) -> NonNull<u8> {
        let bytes = if bytes == 0 { 1 } else { bytes };

        if bytes > MAX_BYTES {
            return match self.system.alloc(bytes) {
                Some(ptr) => ptr,
                None => oom::terminate(),
            };
        }

        let size = round_up(bytes);
        let class = freelist_index(size);

        let mut state = self.state.lock();
        if let Some(ptr) = state.free_lists[class].pop() {
            return ptr;
        }
        state.refill(&self.system, size)
    }

    /// Releases a block previously obtained from [`Self::allocate`] with the
    /// same `size` that was passed to `allocate` (after the zero-size rule:
    /// releasing a block obtained via `allocate(0)` must pass `size == 1`,
    /// not `0`).
    ///
    /// # Panics
    /// Debug builds assert `size != 0` and that `ptr` is non-null; release
    /// builds do not check, matching the original design's "misuse is
    /// undefined behavior" stance for the release path.
    pub fn release(&self, ptr: NonNull<u8>, size: usize) {
        debug_assert_ne!(size, 0, "release: size must match a prior allocate() call");

        if size > MAX_BYTES {
            self.system.dealloc(ptr, size);
            return;
        }

        let class = freelist_index(round_up(size));
        let mut state = self.state.lock();
        // SAFETY: by this function's contract, `ptr` is a block of the
        // matching class size that the caller is relinquishing.
        unsafe { state.free_lists[class].push(ptr) };
    }

    /// Forwards a request with a full [`Layout`] (including alignment
    /// stronger than the fixed grid) straight to the backing allocator,
    /// bypassing the reserve and free lists entirely. Used only by the
    /// `GlobalAlloc` adapter's over-aligned-request path.
    pub(crate) fn large_alloc(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.system.alloc_layout(layout)
    }

    /// The release counterpart of [`Self::large_alloc`].
    pub(crate) fn large_dealloc(&self, ptr: NonNull<u8>, layout: Layout) {
        self.system.dealloc_layout(ptr, layout)
    }
}

#[cfg(feature = "std")]
impl Default for Pool<System> {
    fn default() -> Self {
        Self::new()
    }
}
