//! Workload driver.
//!
//! Runs `iterations` steps. Each step the selector picks an operation:
//!
//! - **Allocate**: skipped when the registry is full; otherwise draw a size and
//!   ask the allocator. A refusal is counted and skipped, never retried.
//! - **Free**: skipped when the registry is empty; otherwise remove a random
//!   record and release its handle. The record leaves the registry before the
//!   release is issued.
//!
//! On every step divisible by the report interval the driver runs the
//! fragmentation probe and samples process memory. When the loop ends, and
//! again on drop, every record still tracked is drained and released.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::Allocator;
use crate::config::RunConfig;
use crate::error::ConfigError;
use crate::memory::MemoryUsage;
use crate::probe::probe_largest_block;
use crate::registry::AllocationRegistry;
use crate::selector::{Operation, Selector};

/// Snapshot emitted at the reporting cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub step: u64,
    pub live_allocations: usize,
    pub tracked_bytes: usize,
    pub largest_free_block: usize,
    pub process_memory_bytes: u64,
}

impl fmt::Display for MetricsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} | live allocations: {} | tracked: {} bytes | largest free block: {} bytes | process memory: {} bytes",
            self.step,
            self.live_allocations,
            self.tracked_bytes,
            self.largest_free_block,
            self.process_memory_bytes
        )
    }
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Allocated,
    Refused,
    CapacitySkip,
    Freed,
    EmptySkip,
}

/// Per-run tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub steps: u64,
    pub allocate_attempts: u64,
    pub allocations: u64,
    pub refusals: u64,
    pub capacity_skips: u64,
    pub frees: u64,
    pub empty_skips: u64,
    pub peak_live: usize,
    pub peak_tracked_bytes: usize,
    pub drained: u64,
    pub probes: u64,
    pub probe_attempts: u64,
}

pub struct WorkloadDriver<'a, A, S, M>
where
    A: Allocator + ?Sized,
    S: Selector + ?Sized,
    M: MemoryUsage + ?Sized,
{
    config: RunConfig,
    registry: AllocationRegistry,
    allocator: &'a mut A,
    selector: &'a mut S,
    memory: &'a M,
    counters: RunCounters,
}

impl<'a, A, S, M> WorkloadDriver<'a, A, S, M>
where
    A: Allocator + ?Sized,
    S: Selector + ?Sized,
    M: MemoryUsage + ?Sized,
{
    pub fn new(
        config: RunConfig,
        allocator: &'a mut A,
        selector: &'a mut S,
        memory: &'a M,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry: AllocationRegistry::new(config.max_allocations),
            config,
            allocator,
            selector,
            memory,
            counters: RunCounters::default(),
        })
    }

    /// Run every step, then drain. `on_report` sees each metrics record as it
    /// is produced.
    pub fn run(&mut self, mut on_report: impl FnMut(&MetricsRecord)) -> RunCounters {
        for step in 0..self.config.iterations {
            if let Some(record) = self.step(step) {
                on_report(&record);
            }
        }
        self.drain();
        self.counters.clone()
    }

    /// Execute step `step` and return a metrics record if it falls on the
    /// reporting cadence.
    pub fn step(&mut self, step: u64) -> Option<MetricsRecord> {
        let op = self.selector.next_operation();
        self.apply(op);
        self.counters.steps += 1;
        (step % self.config.report_interval == 0).then(|| self.sample(step))
    }

    /// Apply one operation against the allocator and registry.
    pub fn apply(&mut self, op: Operation) -> StepOutcome {
        match op {
            Operation::Allocate => self.try_allocate(),
            Operation::Free => self.try_free(),
        }
    }

    fn try_allocate(&mut self) -> StepOutcome {
        if self.registry.is_full() {
            self.counters.capacity_skips += 1;
            return StepOutcome::CapacitySkip;
        }
        let size = self.selector.next_size();
        self.counters.allocate_attempts += 1;
        let Some(handle) = self.allocator.allocate(size) else {
            self.counters.refusals += 1;
            return StepOutcome::Refused;
        };
        if !self.registry.add(handle, size) {
            self.allocator.release(handle);
            self.counters.capacity_skips += 1;
            return StepOutcome::CapacitySkip;
        }
        self.counters.allocations += 1;
        self.counters.peak_live = self.counters.peak_live.max(self.registry.size());
        self.counters.peak_tracked_bytes = self
            .counters
            .peak_tracked_bytes
            .max(self.registry.tracked_bytes());
        StepOutcome::Allocated
    }

    fn try_free(&mut self) -> StepOutcome {
        let Some(record) = self.registry.remove_random(&mut *self.selector) else {
            self.counters.empty_skips += 1;
            return StepOutcome::EmptySkip;
        };
        self.allocator.release(record.handle);
        self.counters.frees += 1;
        StepOutcome::Freed
    }

    /// Probe the allocator and sample process memory.
    pub fn sample(&mut self, step: u64) -> MetricsRecord {
        let probe = probe_largest_block(&mut *self.allocator, self.config.probe);
        self.counters.probes += 1;
        self.counters.probe_attempts += u64::from(probe.attempts);
        MetricsRecord {
            step,
            live_allocations: self.registry.size(),
            tracked_bytes: self.registry.tracked_bytes(),
            largest_free_block: probe.largest_block,
            process_memory_bytes: self.memory.current_resident_bytes(),
        }
    }

    /// Release everything still tracked. Returns how many handles were released.
    pub fn drain(&mut self) -> usize {
        let records = self.registry.drain_all();
        let drained = records.len();
        for record in records {
            self.allocator.release(record.handle);
        }
        self.counters.drained += drained as u64;
        drained
    }

    #[must_use]
    pub fn registry(&self) -> &AllocationRegistry {
        &self.registry
    }

    #[must_use]
    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

impl<A, S, M> Drop for WorkloadDriver<'_, A, S, M>
where
    A: Allocator + ?Sized,
    S: Selector + ?Sized,
    M: MemoryUsage + ?Sized,
{
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            self.drain();
        }
    }
}
