//! Startup errors.
//!
//! Nothing that happens inside a run is an error: allocator refusals and
//! frees against an empty registry are counted outcomes. The only failures are
//! a run configuration that cannot describe a valid workload, or a backend that
//! was not compiled in.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("minimum allocation size must be at least 1 byte")]
    ZeroMinSize,
    #[error("allocation size range is empty: min {min} > max {max}")]
    EmptySizeRange { min: usize, max: usize },
    #[error("maximum tracked allocations must be at least 1")]
    ZeroCapacity,
    #[error("report interval must be at least 1 step")]
    ZeroReportInterval,
    #[error("probe lower bound must be at least 1 byte")]
    ZeroProbeLow,
    #[error("probe range is empty: low {low} > high {high}")]
    EmptyProbeRange { low: usize, high: usize },
    #[error("unknown allocator '{0}', expected system|mimalloc")]
    UnknownAllocator(String),
    #[error("allocator '{0}' is not compiled in (enable the `{0}` feature)")]
    BackendUnavailable(&'static str),
}
