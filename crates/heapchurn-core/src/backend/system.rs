//! Platform `malloc`/`free`.

use std::ptr::NonNull;

use super::{Allocator, Handle};

/// The C library allocator of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl SystemAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Allocator for SystemAllocator {
    fn name(&self) -> &'static str {
        "system"
    }

    fn allocate(&mut self, size: usize) -> Option<Handle> {
        // SAFETY: malloc accepts any size and returns null on failure.
        let ptr = unsafe { libc::malloc(size) };
        let ptr = NonNull::new(ptr.cast::<u8>())?;
        // SAFETY: ptr is a fresh live allocation of this allocator.
        Some(unsafe { Handle::from_raw(ptr) })
    }

    fn release(&mut self, handle: Handle) {
        // SAFETY: handles only come from `allocate` above and the workload
        // releases each exactly once.
        unsafe { libc::free(handle.as_ptr().cast()) };
    }

    fn dump_stats(&self) -> Option<String> {
        mallinfo_report()
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn mallinfo_report() -> Option<String> {
    // SAFETY: mallinfo2 only reads allocator counters.
    let mi = unsafe { libc::mallinfo2() };
    Some(format!(
        "glibc malloc (mallinfo2)\n\
         arena bytes (non-mmapped): {}\n\
         free chunks: {}\n\
         mmapped regions: {}\n\
         mmapped bytes: {}\n\
         in-use bytes: {}\n\
         free bytes: {}\n\
         releasable top bytes: {}\n",
        mi.arena, mi.ordblks, mi.hblks, mi.hblkhd, mi.uordblks, mi.fordblks, mi.keepcost
    ))
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
fn mallinfo_report() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_release_roundtrip() {
        let mut alloc = SystemAllocator::new();
        let a = alloc.allocate(64).expect("malloc(64)");
        let b = alloc.allocate(64).expect("malloc(64)");
        assert_ne!(a, b);
        alloc.release(a);
        alloc.release(b);
    }

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    #[test]
    fn stats_dump_mentions_in_use_bytes() {
        let alloc = SystemAllocator::new();
        let dump = alloc.dump_stats().expect("mallinfo2 on glibc");
        assert!(dump.contains("in-use bytes"));
    }
}
