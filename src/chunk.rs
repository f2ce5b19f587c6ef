//! The chunk allocator: carves the reserve, escalates to the backing
//! allocator under pressure, and recycles free-list blocks as a last resort
//! before giving up.
//!
//! This is the hardest mechanism in the crate. The contract is: given a
//! class size and a desired block count, return a contiguous run of blocks
//! of that size, possibly fewer than asked for but never zero, or terminate
//! the process. See [`chunk_alloc`].

use core::ptr::NonNull;

use crate::free_list::FreeList;
use crate::grid::{class_size, freelist_index, round_up, ALIGN, FREELISTS, MAX_BYTES};
use crate::oom;
use crate::system::SystemAllocator;

/// The current reserve: a contiguous, half-open byte range `[start, start +
/// avail)` carved from the backing allocator, not yet handed out as blocks.
///
/// A freshly constructed `Reserve` is empty (`avail == 0`); `start` is
/// meaningless in that state and is never dereferenced, since every call
/// site checks `avail` first.
pub(crate) struct Reserve {
    start: *mut u8,
    avail: usize,
}

// SAFETY: a `Reserve`'s raw pointer is only ever touched from inside
// `chunk_alloc`, which is always called with the pool's `Mutex` held; there
// is never more than one live reference to the bytes it points at.
unsafe impl Send for Reserve {}
unsafe impl Sync for Reserve {}

impl Reserve {
    /// An empty reserve.
    pub const fn new() -> Self {
        Self {
            start: core::ptr::null_mut(),
            avail: 0,
        }
    }

    /// Bytes remaining in the reserve. Always a multiple of [`ALIGN`].
    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.avail
    }
}

/// Carves `nblocks` blocks of `size` bytes each out of the reserve,
/// escalating to the backing allocator or to larger free lists as needed.
///
/// Returns the address of the first block and the number of blocks actually
/// served (`1 <= served <= nblocks`). Never returns a served count of `0`;
/// instead it terminates the process (see [`oom`]) once every avenue —
/// carving, growing the reserve, and recycling a larger free-list block — is
/// exhausted.
///
/// `size` must be a multiple of `ALIGN` in `[ALIGN, MAX_BYTES]`; `nblocks`
/// must be at least `1`.
pub(crate) fn chunk_alloc<S: SystemAllocator>(
    reserve: &mut Reserve,
    free_lists: &mut [FreeList; FREELISTS],
    total_used: &mut usize,
    system: &S,
    size: usize,
    nblocks: usize,
) -> (NonNull<u8>, usize) {
    debug_assert!(size >= ALIGN && size <= MAX_BYTES && size % ALIGN == 0);
    debug_assert!(nblocks >= 1);

    loop {
        let want = size * nblocks;

        // C1: the reserve fully covers the request.
        if reserve.avail >= want {
            let ptr = reserve.start;
            reserve.start = reserve.start.wrapping_add(want);
            reserve.avail -= want;
            // SAFETY: `ptr` came from a prior backing-allocator/free-list
            // grant, none of which ever hand out a null pointer.
            return (unsafe { NonNull::new_unchecked(ptr) }, nblocks);
        }

        // C2: the reserve covers at least one block, just not all of them.
        if reserve.avail >= size {
            let served = reserve.avail / size;
            let bytes = served * size;
            let ptr = reserve.start;
            reserve.start = reserve.start.wrapping_add(bytes);
            reserve.avail -= bytes;
            return (unsafe { NonNull::new_unchecked(ptr) }, served);
        }

        // C3: the reserve cannot cover a single block. Escalate.

        // Step 1: salvage the leftover onto its matching free list. Safe
        // because invariant (1) guarantees `avail` is a multiple of ALIGN.
        if reserve.avail > 0 {
            let leftover = NonNull::new(reserve.start)
                .expect("Reserve: non-empty reserve must have a non-null start");
            let class = freelist_index(reserve.avail);
            // SAFETY: `leftover` is exactly `class_size(class)` bytes (equal
            // to `reserve.avail`) and is being relinquished by the reserve,
            // which owns no other reference to it.
            unsafe { free_lists[class].push(leftover) };
            reserve.start = core::ptr::null_mut();
            reserve.avail = 0;
        }

        // Step 2: ask the backing allocator for a fresh, larger reserve.
        let slack = round_up(*total_used >> 4);
        let bytes_to_alloc = 2 * want + slack;
        if let Some(fresh) = system.alloc(bytes_to_alloc) {
            reserve.start = fresh.as_ptr();
            reserve.avail = bytes_to_alloc;
            *total_used += bytes_to_alloc;
            continue; // retry: case C1 now succeeds
        }

        // Step 3: recycle one block from the smallest larger free list that
        // isn't empty, and install it as the entire new reserve.
        let start_class = freelist_index(size);
        let mut recycled = false;
        for class in start_class..FREELISTS {
            if let Some(block) = free_lists[class].pop() {
                reserve.start = block.as_ptr();
                reserve.avail = class_size(class);
                recycled = true;
                break;
            }
        }
        if recycled {
            continue; // retry: case C1 now succeeds
        }

        // Step 4: give up. Nothing left to try.
        reserve.start = core::ptr::null_mut();
        reserve.avail = 0;
        oom::terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::mock::MockSystem;

    fn fresh_lists() -> [FreeList; FREELISTS] {
        core::array::from_fn(|_| FreeList::new())
    }

    #[test]
    fn cold_start_escalates_to_backing_allocator() {
        let system = MockSystem::new();
        let mut reserve = Reserve::new();
        let mut lists = fresh_lists();
        let mut total_used = 0usize;

        let (_, served) = chunk_alloc(&mut reserve, &mut lists, &mut total_used, &system, 8, 20);
        assert_eq!(served, 20);
        assert_eq!(system.calls(), vec![320]);
        assert_eq!(reserve.available(), 320 - 160);
        assert_eq!(total_used, 320);
    }

    #[test]
    fn reserve_alone_serves_a_smaller_follow_up_request() {
        let system = MockSystem::new();
        let mut reserve = Reserve::new();
        let mut lists = fresh_lists();
        let mut total_used = 0usize;

        chunk_alloc(&mut reserve, &mut lists, &mut total_used, &system, 8, 20);
        let before = system.calls().len();
        let (_, served) = chunk_alloc(&mut reserve, &mut lists, &mut total_used, &system, 8, 5);
        assert_eq!(served, 5);
        assert_eq!(system.calls().len(), before, "must not touch backing allocator again");
    }

    #[test]
    fn partial_reserve_lowers_served_count_c2() {
        let system = MockSystem::new();
        let mut reserve = Reserve::new();
        let mut lists = fresh_lists();
        let mut total_used = 0usize;

        // carve down to exactly 3 blocks of 8 bytes remaining
        chunk_alloc(&mut reserve, &mut lists, &mut total_used, &system, 8, 20);
        let (_, first) = chunk_alloc(&mut reserve, &mut lists, &mut total_used, &system, 8, 17);
        assert_eq!(first, 17);
        assert_eq!(reserve.available(), 24);

        let calls_before = system.calls().len();
        let (_, served) = chunk_alloc(&mut reserve, &mut lists, &mut total_used, &system, 8, 20);
        assert_eq!(served, 3, "must be lowered to what the reserve can cover");
        assert_eq!(system.calls().len(), calls_before);
    }

    #[test]
    fn leftover_salvage_then_growth_c3_step_1_and_2() {
        let system = MockSystem::new();
        let mut reserve = Reserve {
            start: alloc_fixture(16),
            avail: 16,
        };
        let mut lists = fresh_lists();
        let mut total_used = 0usize;

        let (_, served) = chunk_alloc(&mut reserve, &mut lists, &mut total_used, &system, 24, 20);
        assert_eq!(served, 20);
        // the 16-byte leftover was salvaged onto free list for class-of(16)
        assert!(!lists[freelist_index(16)].is_empty());
        // one call was made to the backing allocator, for 2*480 bytes (no
        // slack yet, since total_used started at 0)
        assert_eq!(system.calls(), vec![960]);
    }

    #[test]
    fn recycle_from_larger_free_list_when_backing_allocator_fails() {
        let system = MockSystem::new();
        let mut reserve = Reserve::new();
        let mut lists = fresh_lists();
        let mut total_used = 0usize;

        // seed free list 15 (class of 128 bytes) with one real block
        let block = alloc_fixture(128);
        unsafe { lists[15].push(NonNull::new(block).unwrap()) };

        system.fail_next(1);
        let (_, served) = chunk_alloc(&mut reserve, &mut lists, &mut total_used, &system, 8, 20);
        assert_eq!(served, 20, "128 / 8 == 16, but only 20 were asked for and 16 < 20 -> C2 lowers it");
        assert_eq!(reserve.available(), 0);
        assert!(lists[15].is_empty());
    }

    /// Leak a real, correctly aligned allocation for use as reserve memory in
    /// tests that construct a `Reserve` directly instead of going through
    /// `chunk_alloc`'s own backing-allocator path.
    fn alloc_fixture(bytes: usize) -> *mut u8 {
        let layout = core::alloc::Layout::from_size_align(bytes, ALIGN).unwrap();
        unsafe { std::alloc::alloc(layout) }
    }
}
