//! jemalloc backend.

use std::ffi::{CStr, c_char, c_void};
use std::ptr::NonNull;

use super::{Allocator, Handle};

/// jemalloc, built from source by `tikv-jemalloc-sys` with prefixed symbols,
/// so it runs alongside the system `malloc` rather than replacing it.
#[derive(Debug, Default, Clone, Copy)]
pub struct JemallocAllocator;

impl JemallocAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Allocator for JemallocAllocator {
    fn name(&self) -> &'static str {
        "jemalloc"
    }

    fn allocate(&mut self, size: usize) -> Option<Handle> {
        // SAFETY: jemalloc's malloc accepts any size and returns null on failure.
        let ptr = unsafe { tikv_jemalloc_sys::malloc(size) };
        let ptr = NonNull::new(ptr.cast::<u8>())?;
        // SAFETY: ptr is a fresh live allocation of this allocator.
        Some(unsafe { Handle::from_raw(ptr) })
    }

    fn release(&mut self, handle: Handle) {
        // SAFETY: handles only come from `allocate` above and are released once.
        unsafe { tikv_jemalloc_sys::free(handle.as_ptr().cast()) };
    }

    fn dump_stats(&self) -> Option<String> {
        let mut out = String::new();
        // SAFETY: `collect_output` only runs during this call and `out`
        // outlives it. A null options string selects the full report.
        unsafe {
            tikv_jemalloc_sys::malloc_stats_print(
                Some(collect_output),
                (&raw mut out).cast::<c_void>(),
                std::ptr::null(),
            );
        }
        (!out.is_empty()).then_some(out)
    }
}

unsafe extern "C" fn collect_output(arg: *mut c_void, msg: *const c_char) {
    if msg.is_null() || arg.is_null() {
        return;
    }
    // SAFETY: `arg` is the `String` passed by `dump_stats`; `msg` is a
    // NUL-terminated string owned by jemalloc for the duration of the call.
    let (out, text) = unsafe { (&mut *arg.cast::<String>(), CStr::from_ptr(msg)) };
    out.push_str(&text.to_string_lossy());
}
