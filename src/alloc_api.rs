//! The `GlobalAlloc` adapter: lets any [`Pool`] be installed as the process's
//! `#[global_allocator]`.
//!
//! This is the only module aware of [`Layout`]; everything below it works in
//! plain byte counts, matching the pool façade's contract exactly.

use core::alloc::{GlobalAlloc, Layout};

use crate::grid::ALIGN;
use crate::pool::Pool;
use crate::system::SystemAllocator;

/// # Safety
/// `Pool::allocate`/`Pool::release` uphold every safety requirement
/// `GlobalAlloc` places on `alloc`/`dealloc`: they never return a dangling
/// pointer for a successful call (exhaustion terminates the process instead
/// of returning), and `release` accepts exactly the `(ptr, size)` pair
/// `alloc` handed out, which is all `dealloc`'s `(ptr, layout)` pair
/// supplies once alignment has been accounted for below.
unsafe impl<S: SystemAllocator> GlobalAlloc for Pool<S> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // The fixed grid only ever hands out blocks aligned to ALIGN; a
        // request for stronger alignment is out of scope for the small-object
        // path (Non-goal: alignment stronger than the fixed grid) and is
        // routed straight to the backing allocator instead, regardless of
        // size.
        if layout.align() > ALIGN {
            return match self.large_alloc(layout) {
                Some(ptr) => ptr.as_ptr(),
                None => crate::oom::terminate(),
            };
        }
        self.allocate(layout.size()).as_ptr()
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        let Some(ptr) = core::ptr::NonNull::new(ptr) else {
            return;
        };
        if layout.align() > ALIGN {
            self.large_dealloc(ptr, layout);
            return;
        }
        self.release(ptr, layout.size());
    }
}
