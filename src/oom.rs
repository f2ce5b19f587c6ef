//! Process termination on irrecoverable exhaustion.
//!
//! The pool's public contract is "returns a usable pointer or the process
//! terminates" (see `pool::Pool::allocate`); every internal primitive below
//! that line stays `Option`/count-returning (`SystemAllocator::alloc`,
//! `chunk::chunk_alloc`, `free_list::FreeList::pop`). This module is the one
//! place the terminating half of that split lives.

/// The status the process is terminated with on exhaustion, named after the
/// original design's `STY_ALLOC_OOM`.
pub const OOM_EXIT_CODE: i32 = -1;

/// Terminates the process because every escalation avenue in `chunk_alloc`
/// (or the large-object passthrough) has been exhausted.
///
/// Under the `std` feature this exits the process with [`OOM_EXIT_CODE`].
/// Without it, there is no hosted process to exit with a status code, so
/// this panics instead and leaves the actual halt/reset to the embedder's
/// panic handler — the same split of responsibility
/// `core::alloc::handle_alloc_error` uses for allocation failure in `no_std`
/// binaries.
#[cfg(feature = "std")]
pub(crate) fn terminate() -> ! {
    std::process::exit(OOM_EXIT_CODE);
}

#[cfg(not(feature = "std"))]
pub(crate) fn terminate() -> ! {
    panic!("stypool: backing allocator exhausted, pool cannot satisfy request");
}
