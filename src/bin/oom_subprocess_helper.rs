//! Helper binary for the terminal-exhaustion integration test.
//!
//! Drives a pool whose backing allocator always fails and whose free lists
//! start empty, so the very first `allocate` call has no escalation avenue
//! left and must terminate the process. `std::process::exit` cannot be
//! observed from inside the same test binary that calls it, hence this is a
//! separate binary driven by a subprocess test instead of a unit test.

use std::ptr::NonNull;

use stypool::system::SystemAllocator;
use stypool::Pool;

struct AlwaysFails;

impl SystemAllocator for AlwaysFails {
    fn alloc(&self, _bytes: usize) -> Option<NonNull<u8>> {
        None
    }

    fn dealloc(&self, _ptr: NonNull<u8>, _bytes: usize) {}
}

fn main() {
    let pool = Pool::with_system(AlwaysFails);
    let _ = pool.allocate(8);
    unreachable!("Pool::allocate must terminate the process before returning here");
}
