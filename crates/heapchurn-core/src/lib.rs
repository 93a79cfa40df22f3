//! # heapchurn-core
//!
//! Workload and measurement engine for stressing a dynamic memory allocator.
//!
//! A [`WorkloadDriver`] runs a fixed number of steps. Each step an injected
//! [`Selector`] picks allocate or free, the chosen operation is applied to an
//! [`Allocator`] backend, and live allocations are tracked in an
//! [`AllocationRegistry`]. At the reporting cadence the driver runs the
//! fragmentation [`probe`] and samples process memory, producing a
//! [`MetricsRecord`]. Everything still tracked when the run ends is drained and
//! released exactly once.
//!
//! `unsafe` is confined to the allocator backends and the platform memory query.

#![deny(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]

#[allow(unsafe_code)]
pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
#[allow(unsafe_code)]
pub mod memory;
pub mod probe;
pub mod registry;
pub mod selector;

pub use backend::{Allocator, AllocatorKind, FakeAllocator, Handle, SystemAllocator};
pub use config::RunConfig;
pub use driver::{MetricsRecord, RunCounters, StepOutcome, WorkloadDriver};
pub use error::ConfigError;
pub use memory::{MemoryUsage, ProcessMemory};
pub use probe::{ProbeBounds, ProbeOutcome, probe_largest_block};
pub use registry::{AllocationRecord, AllocationRegistry};
pub use selector::{Operation, RandomSelector, Selector, random_seed};
