//! The backing allocator: the collaborator the pool escalates to.
//!
//! The original design called this "the system allocator" and specified it
//! only by contract (allocate raw bytes or fail; free raw bytes). This module
//! generalizes that contract into the [`SystemAllocator`] trait so the same
//! pool code can sit in front of the process heap on hosted targets, or in
//! front of any other [`GlobalAlloc`] on `no_std` targets.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::NonNull;

use crate::grid::ALIGN;

/// A backing allocator the pool escalates to when its reserve runs dry.
///
/// Implementations must never panic or unwind; a failed allocation is
/// reported as `None`, mirroring the original `sys_alloc` contract of
/// "returns memory or terminates" except that the terminating decision is
/// made by the pool (§7 of the design), not by this trait.
pub trait SystemAllocator {
    /// Requests a fresh, uninitialized region of exactly `bytes` bytes,
    /// aligned to at least [`ALIGN`].
    fn alloc(&self, bytes: usize) -> Option<NonNull<u8>>;

    /// Releases a region previously returned by [`alloc`](Self::alloc) with
    /// the same `bytes` length.
    fn dealloc(&self, ptr: NonNull<u8>, bytes: usize);

    /// Requests a region satisfying the full `layout`, including alignments
    /// stronger than [`ALIGN`].
    ///
    /// Only the `GlobalAlloc` adapter's over-aligned-request path (see
    /// `alloc_api`) calls this; the pool's own reserve/free-list machinery
    /// only ever needs [`alloc`](Self::alloc). The default implementation
    /// ignores `layout.align()` beyond `ALIGN`, which is only correct for
    /// backing allocators that always return `ALIGN`-or-better aligned
    /// memory; [`System`] and [`Backing`] both override it to honor the
    /// requested alignment exactly.
    fn alloc_layout(&self, layout: Layout) -> Option<NonNull<u8>> {
        self.alloc(layout.size())
    }

    /// Releases a region previously returned by
    /// [`alloc_layout`](Self::alloc_layout) with the same `layout`.
    fn dealloc_layout(&self, ptr: NonNull<u8>, layout: Layout) {
        self.dealloc(ptr, layout.size())
    }
}

/// Backs the pool directly with the process heap via `std::alloc::System`.
///
/// This is the default backing allocator and is only available under the
/// `std` feature, since a hosted process heap is what "the system allocator"
/// means once there is an operating system underneath.
#[cfg(feature = "std")]
#[derive(Debug, Default, Clone, Copy)]
pub struct System;

#[cfg(feature = "std")]
impl SystemAllocator for System {
    fn alloc(&self, bytes: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(bytes, ALIGN).ok()?;
        // SAFETY: `layout` has non-zero size (the pool never asks for 0
        // bytes, see `pool::Pool::allocate`) and a valid alignment.
        let ptr = unsafe { GlobalAlloc::alloc(&std::alloc::System, layout) };
        NonNull::new(ptr)
    }

    fn dealloc(&self, ptr: NonNull<u8>, bytes: usize) {
        let layout = Layout::from_size_align(bytes, ALIGN)
            .expect("System::dealloc: bytes/ALIGN formed an invalid layout");
        // SAFETY: `ptr` was returned by a prior call to `alloc` with the
        // same `bytes`, by this trait's contract.
        unsafe { GlobalAlloc::dealloc(&std::alloc::System, ptr.as_ptr(), layout) };
    }

    fn alloc_layout(&self, layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY: `layout` is caller-supplied and non-zero-sized by the
        // `GlobalAlloc` contract this is reached through.
        let ptr = unsafe { GlobalAlloc::alloc(&std::alloc::System, layout) };
        NonNull::new(ptr)
    }

    fn dealloc_layout(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: `ptr`/`layout` were returned by a prior `alloc_layout` call.
        unsafe { GlobalAlloc::dealloc(&std::alloc::System, ptr.as_ptr(), layout) };
    }
}

/// Wraps any [`GlobalAlloc`] implementation so it can back a [`Pool`].
///
/// This is the `no_std` escape hatch: wrap a linked-list heap, a bump
/// allocator, or any other `GlobalAlloc` impl in `Backing` and use it as the
/// pool's backing allocator instead of [`System`].
///
/// [`Pool`]: crate::pool::Pool
pub struct Backing<G>(pub G);

impl<G: GlobalAlloc> SystemAllocator for Backing<G> {
    fn alloc(&self, bytes: usize) -> Option<NonNull<u8>> {
        let layout = Layout::from_size_align(bytes, ALIGN).ok()?;
        // SAFETY: same reasoning as `System::alloc` above.
        let ptr = unsafe { self.0.alloc(layout) };
        NonNull::new(ptr)
    }

    fn dealloc(&self, ptr: NonNull<u8>, bytes: usize) {
        let layout = Layout::from_size_align(bytes, ALIGN)
            .expect("Backing::dealloc: bytes/ALIGN formed an invalid layout");
        // SAFETY: same reasoning as `System::dealloc` above.
        unsafe { self.0.dealloc(ptr.as_ptr(), layout) };
    }

    fn alloc_layout(&self, layout: Layout) -> Option<NonNull<u8>> {
        // SAFETY: same reasoning as `System::alloc_layout` above.
        NonNull::new(unsafe { self.0.alloc(layout) })
    }

    fn dealloc_layout(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: same reasoning as `System::dealloc_layout` above.
        unsafe { self.0.dealloc(ptr.as_ptr(), layout) };
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! A backing allocator used only by the crate's own tests, able to
    //! record every call it receives and to be told to fail on demand.
    //!
    //! Tests use this to assert on exactly how many times (and with what
    //! size) the pool escalates to its backing allocator, and to exercise
    //! the recycle-from-free-list path by forcing an allocation to fail.
    extern crate std;

    use super::*;
    use std::sync::Mutex;
    use std::vec::Vec;

    pub(crate) struct MockSystem {
        inner: Mutex<Inner>,
    }

    struct Inner {
        calls: Vec<usize>,
        fail_next: usize,
        // leaked `System`-backed allocations so we can actually write into
        // them like real pool memory and free them at process exit.
        backing: System,
    }

    impl MockSystem {
        pub(crate) fn new() -> Self {
            Self {
                inner: Mutex::new(Inner {
                    calls: Vec::new(),
                    fail_next: 0,
                    backing: System,
                }),
            }
        }

        /// Makes the next `n` calls to `alloc` fail, regardless of size.
        pub(crate) fn fail_next(&self, n: usize) {
            self.inner.lock().unwrap().fail_next = n;
        }

        /// Every size requested so far, in call order.
        pub(crate) fn calls(&self) -> Vec<usize> {
            self.inner.lock().unwrap().calls.clone()
        }
    }

    impl SystemAllocator for MockSystem {
        fn alloc(&self, bytes: usize) -> Option<NonNull<u8>> {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push(bytes);
            if inner.fail_next > 0 {
                inner.fail_next -= 1;
                return None;
            }
            inner.backing.alloc(bytes)
        }

        fn dealloc(&self, ptr: NonNull<u8>, bytes: usize) {
            self.inner.lock().unwrap().backing.dealloc(ptr, bytes);
        }

        fn alloc_layout(&self, layout: Layout) -> Option<NonNull<u8>> {
            self.inner.lock().unwrap().backing.alloc_layout(layout)
        }

        fn dealloc_layout(&self, ptr: NonNull<u8>, layout: Layout) {
            self.inner.lock().unwrap().backing.dealloc_layout(ptr, layout)
        }
    }
}
