//! Allocator backends.
//!
//! The workload only sees the [`Allocator`] trait. Concrete backends:
//! - [`SystemAllocator`]: the platform `malloc`/`free`.
//! - [`MimallocAllocator`]: `mi_malloc`/`mi_free` (feature `mimalloc`).
//! - [`JemallocAllocator`]: prefixed jemalloc `malloc`/`free` (feature `jemalloc`).
//! - [`FakeAllocator`]: deterministic bookkeeping-only allocator used by tests
//!   and benches. It never touches real memory.
//!
//! Backend selection happens once, at startup, through [`AllocatorKind`].

pub mod fake;
#[cfg(feature = "jemalloc")]
pub mod jemalloc;
#[cfg(feature = "mimalloc")]
pub mod mimalloc;
pub mod system;

use std::fmt;
use std::ptr::NonNull;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use fake::FakeAllocator;
#[cfg(feature = "jemalloc")]
pub use jemalloc::JemallocAllocator;
#[cfg(feature = "mimalloc")]
pub use mimalloc::MimallocAllocator;
pub use system::SystemAllocator;

/// Opaque reference to one live allocation.
///
/// A handle is valid from the `allocate` call that produced it until it is
/// passed to `release` on the same allocator. It is never dereferenced by the
/// workload.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonNull<u8>);

impl Handle {
    /// Wrap a pointer returned by an allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must identify a live allocation of the allocator this handle will
    /// eventually be released to, and must not be wrapped twice while live.
    #[must_use]
    pub const unsafe fn from_raw(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    #[must_use]
    pub const fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// Numeric address, for logging and bookkeeping.
    #[must_use]
    pub fn addr(self) -> usize {
        self.0.as_ptr().addr()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.addr())
    }
}

/// A dynamic memory allocator under test.
pub trait Allocator {
    /// Short backend name used in reports.
    fn name(&self) -> &'static str;

    /// Allocate `size` bytes. `None` means the allocator refused the request.
    ///
    /// `size` is always at least 1.
    fn allocate(&mut self, size: usize) -> Option<Handle>;

    /// Return a handle obtained from [`Allocator::allocate`] on this allocator.
    ///
    /// Each handle is released at most once; the workload guarantees it.
    fn release(&mut self, handle: Handle);

    /// Best-effort dump of allocator-internal statistics.
    fn dump_stats(&self) -> Option<String> {
        None
    }
}

impl<A: Allocator + ?Sized> Allocator for Box<A> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn allocate(&mut self, size: usize) -> Option<Handle> {
        (**self).allocate(size)
    }

    fn release(&mut self, handle: Handle) {
        (**self).release(handle);
    }

    fn dump_stats(&self) -> Option<String> {
        (**self).dump_stats()
    }
}

/// Backends selectable at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocatorKind {
    System,
    Mimalloc,
    Jemalloc,
}

impl AllocatorKind {
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::System, Self::Mimalloc, Self::Jemalloc]
    }

    /// Parse a backend name (case-insensitive, common aliases accepted).
    pub fn from_str_loose(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" | "libc" | "malloc" | "glibc" => Ok(Self::System),
            "mimalloc" | "mi" => Ok(Self::Mimalloc),
            "jemalloc" | "je" => Ok(Self::Jemalloc),
            _ => Err(ConfigError::UnknownAllocator(s.to_string())),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Mimalloc => "mimalloc",
            Self::Jemalloc => "jemalloc",
        }
    }

    /// Whether this backend was compiled into the binary.
    #[must_use]
    pub const fn is_available(self) -> bool {
        match self {
            Self::System => true,
            Self::Mimalloc => cfg!(feature = "mimalloc"),
            Self::Jemalloc => cfg!(feature = "jemalloc"),
        }
    }

    /// Backends compiled into this binary.
    #[must_use]
    pub fn available() -> Vec<Self> {
        Self::all()
            .into_iter()
            .filter(|kind| kind.is_available())
            .collect()
    }

    /// Construct the backend.
    pub fn build(self) -> Result<Box<dyn Allocator>, ConfigError> {
        match self {
            Self::System => Ok(Box::new(SystemAllocator::new())),
            #[cfg(feature = "mimalloc")]
            Self::Mimalloc => Ok(Box::new(MimallocAllocator::new())),
            #[cfg(not(feature = "mimalloc"))]
            Self::Mimalloc => Err(ConfigError::BackendUnavailable(self.as_str())),
            #[cfg(feature = "jemalloc")]
            Self::Jemalloc => Ok(Box::new(JemallocAllocator::new())),
            #[cfg(not(feature = "jemalloc"))]
            Self::Jemalloc => Err(ConfigError::BackendUnavailable(self.as_str())),
        }
    }
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
