//! Process memory query.
//!
//! Best-effort, and the measure depends on the platform:
//!
//! - Linux: resident set size (`VmRSS` from `/proc/self/status`).
//! - macOS: bytes in use in the default malloc zone.
//! - Windows: working set size from `GetProcessMemoryInfo`.
//! - Anything else: 0.
//!
//! Heap-only accounting on glibc (`mallinfo2`) is part of the system
//! backend's statistics dump, not of this metric.

/// Source of the process-memory metric.
pub trait MemoryUsage {
    /// Memory attributed to the current process in bytes, or 0 when unknown.
    fn current_resident_bytes(&self) -> u64;
}

/// Reads the platform's process memory figure.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl MemoryUsage for ProcessMemory {
    fn current_resident_bytes(&self) -> u64 {
        platform_bytes()
    }
}

#[cfg(target_os = "linux")]
fn platform_bytes() -> u64 {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| parse_vm_rss_kb(&status))
        .map_or(0, |kb| kb.saturating_mul(1024))
}

#[cfg(target_os = "macos")]
fn platform_bytes() -> u64 {
    let mut stats = std::mem::MaybeUninit::<libc::malloc_statistics_t>::uninit();
    // SAFETY: the default zone is always registered, and
    // malloc_zone_statistics fills every field of `stats`.
    let stats = unsafe {
        libc::malloc_zone_statistics(libc::malloc_default_zone(), stats.as_mut_ptr());
        stats.assume_init()
    };
    stats.size_in_use as u64
}

#[cfg(windows)]
fn platform_bytes() -> u64 {
    use windows_sys::Win32::System::ProcessStatus::{GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS};
    use windows_sys::Win32::System::Threading::GetCurrentProcess;

    let mut counters = std::mem::MaybeUninit::<PROCESS_MEMORY_COUNTERS>::zeroed();
    let cb = std::mem::size_of::<PROCESS_MEMORY_COUNTERS>() as u32;
    // SAFETY: the pseudo-handle from GetCurrentProcess needs no closing and
    // `counters` is a writable buffer of exactly `cb` bytes.
    let ok = unsafe { GetProcessMemoryInfo(GetCurrentProcess(), counters.as_mut_ptr(), cb) };
    if ok == 0 {
        return 0;
    }
    // SAFETY: zero-initialised plain-old-data, filled in on success.
    let counters = unsafe { counters.assume_init() };
    counters.WorkingSetSize as u64
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn platform_bytes() -> u64 {
    0
}

/// Extract the `VmRSS:` value (kB) from a `/proc/<pid>/status` body.
#[must_use]
pub fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|value| value.parse().ok())
}
