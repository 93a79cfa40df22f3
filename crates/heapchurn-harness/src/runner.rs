//! Run execution.
//!
//! Resolves a [`RunRequest`] into a backend, a seeded selector and the
//! process-memory source, drives the workload, and assembles a [`RunReport`].
//! Every run is mirrored to the structured log as `run_start`, one `metrics`
//! event per record, `run_complete`, and `stats`.

use std::time::Instant;

use heapchurn_core::selector::random_seed;
use heapchurn_core::{
    Allocator, AllocatorKind, MemoryUsage, MetricsRecord, ProcessMemory, RandomSelector,
    RunConfig, WorkloadDriver,
};

use crate::error::HarnessError;
use crate::report::{RunReport, RunSummary};
use crate::structured_log::{LogEmitter, LogLevel, Outcome};

/// One workload run, as requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunRequest {
    pub allocator: AllocatorKind,
    pub config: RunConfig,
    /// Fixed seed for replay; a fresh one is drawn when absent.
    pub seed: Option<u64>,
    /// Ask the backend for its statistics dump after the run.
    pub collect_stats: bool,
}

impl RunRequest {
    #[must_use]
    pub fn new(allocator: AllocatorKind, config: RunConfig) -> Self {
        Self {
            allocator,
            config,
            seed: None,
            collect_stats: true,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Run against the real backend named in `request`, sampling the real process
/// resident set.
pub fn execute(
    request: &RunRequest,
    log: &mut LogEmitter,
    on_report: impl FnMut(&MetricsRecord),
) -> Result<RunReport, HarnessError> {
    request.config.validate()?;
    let mut allocator = request.allocator.build()?;
    execute_with(&mut *allocator, &ProcessMemory, request, log, on_report)
}

/// Run against an explicit allocator and memory source.
///
/// `request.allocator` is ignored; the report names `allocator` by
/// [`Allocator::name`].
pub fn execute_with<A, M>(
    allocator: &mut A,
    memory: &M,
    request: &RunRequest,
    log: &mut LogEmitter,
    mut on_report: impl FnMut(&MetricsRecord),
) -> Result<RunReport, HarnessError>
where
    A: Allocator + ?Sized,
    M: MemoryUsage + ?Sized,
{
    let config = request.config;
    let seed = request.seed.unwrap_or_else(random_seed);
    let name = allocator.name();

    let start = log
        .entry(LogLevel::Info, "run_start")
        .with_allocator(name)
        .with_seed(seed)
        .with_details(serde_json::to_value(config)?);
    log.emit_entry(start)?;

    let mut selector = RandomSelector::with_seed(seed, config.min_size, config.max_size);
    let mut metrics = Vec::with_capacity(usize::try_from(config.expected_reports()).unwrap_or(0));
    let mut log_error = None;

    let began = Instant::now();
    let counters = {
        let mut driver = WorkloadDriver::new(config, &mut *allocator, &mut selector, memory)?;
        driver.run(|record| {
            on_report(record);
            metrics.push(*record);
            if log_error.is_none() {
                let entry = log
                    .entry(LogLevel::Info, "metrics")
                    .with_allocator(name)
                    .with_metrics(record);
                if let Err(err) = log.emit_entry(entry) {
                    log_error = Some(err);
                }
            }
        })
    };
    let elapsed_ms = u64::try_from(began.elapsed().as_millis()).unwrap_or(u64::MAX);
    if let Some(err) = log_error {
        return Err(err.into());
    }

    let complete = log
        .entry(LogLevel::Info, "run_complete")
        .with_allocator(name)
        .with_seed(seed)
        .with_outcome(Outcome::Pass)
        .with_duration_ms(elapsed_ms)
        .with_details(serde_json::to_value(&counters)?);
    log.emit_entry(complete)?;

    let stats = if request.collect_stats {
        allocator.dump_stats()
    } else {
        None
    };
    let stats_entry = log
        .entry(LogLevel::Debug, "stats")
        .with_allocator(name)
        .with_outcome(if stats.is_some() {
            Outcome::Pass
        } else {
            Outcome::Skip
        })
        .with_details(serde_json::json!({
            "requested": request.collect_stats,
            "bytes": stats.as_ref().map_or(0, String::len),
        }));
    log.emit_entry(stats_entry)?;
    log.flush()?;

    Ok(RunReport {
        allocator: name.to_string(),
        seed,
        config,
        metrics,
        summary: RunSummary {
            allocator: name.to_string(),
            seed,
            elapsed_ms,
            counters,
        },
        stats,
    })
}
