//! mimalloc backend.

use std::ffi::{CStr, c_char, c_void};
use std::ptr::NonNull;

use super::{Allocator, Handle};

/// Microsoft's mimalloc, linked statically through `libmimalloc-sys`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimallocAllocator;

impl MimallocAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Allocator for MimallocAllocator {
    fn name(&self) -> &'static str {
        "mimalloc"
    }

    fn allocate(&mut self, size: usize) -> Option<Handle> {
        // SAFETY: mi_malloc accepts any size and returns null on failure.
        let ptr = unsafe { libmimalloc_sys::mi_malloc(size) };
        let ptr = NonNull::new(ptr.cast::<u8>())?;
        // SAFETY: ptr is a fresh live allocation of this allocator.
        Some(unsafe { Handle::from_raw(ptr) })
    }

    fn release(&mut self, handle: Handle) {
        // SAFETY: handles only come from `allocate` above and are released once.
        unsafe { libmimalloc_sys::mi_free(handle.as_ptr().cast()) };
    }

    fn dump_stats(&self) -> Option<String> {
        let mut out = String::new();
        // SAFETY: `collect_output` only runs during this call and `out`
        // outlives it.
        unsafe {
            libmimalloc_sys::mi_stats_print_out(
                Some(collect_output),
                (&raw mut out).cast::<c_void>(),
            );
        }
        (!out.is_empty()).then_some(out)
    }
}

unsafe extern "C" fn collect_output(msg: *const c_char, arg: *mut c_void) {
    if msg.is_null() || arg.is_null() {
        return;
    }
    // SAFETY: `arg` is the `String` passed by `dump_stats`; `msg` is a
    // NUL-terminated string owned by mimalloc for the duration of the call.
    let (out, text) = unsafe { (&mut *arg.cast::<String>(), CStr::from_ptr(msg)) };
    out.push_str(&text.to_string_lossy());
}
