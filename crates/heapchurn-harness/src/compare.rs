//! Side-by-side allocator comparison.
//!
//! Each backend runs in its own child process (`heapchurn run --format json`)
//! so it starts from a clean process heap and its resident-set numbers are not
//! polluted by the other backends. Every child gets the same seed, which makes
//! the operation sequence identical across backends.

use std::fmt::Write as _;
use std::path::Path;
use std::process::Command as ProcCommand;

use heapchurn_core::{AllocatorKind, RunConfig};
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::report::RunReport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub seed: u64,
    pub config: RunConfig,
    pub runs: Vec<RunReport>,
}

/// Arguments for a child `run` that reproduces `config` and `seed` exactly.
#[must_use]
pub fn run_args(kind: AllocatorKind, config: &RunConfig, seed: u64) -> Vec<String> {
    vec![
        "run".to_string(),
        "--format".to_string(),
        "json".to_string(),
        "--allocator".to_string(),
        kind.as_str().to_string(),
        "--seed".to_string(),
        format!("0x{seed:X}"),
        "--iterations".to_string(),
        config.iterations.to_string(),
        "--max-allocations".to_string(),
        config.max_allocations.to_string(),
        "--min-size".to_string(),
        config.min_size.to_string(),
        "--max-size".to_string(),
        config.max_size.to_string(),
        "--report-interval".to_string(),
        config.report_interval.to_string(),
        "--probe-low".to_string(),
        config.probe.low.to_string(),
        "--probe-high".to_string(),
        config.probe.high.to_string(),
    ]
}

/// Run one backend in a child process and parse its JSON report.
pub fn run_subprocess(
    exe: &Path,
    kind: AllocatorKind,
    config: &RunConfig,
    seed: u64,
) -> Result<RunReport, HarnessError> {
    let output = ProcCommand::new(exe)
        .args(run_args(kind, config, seed))
        .output()?;

    if !output.status.success() {
        return Err(HarnessError::Subprocess {
            allocator: kind.as_str().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(RunReport::from_json(&output.stdout)?)
}

/// Run every backend in `kinds` and collect the reports in order.
pub fn compare(
    exe: &Path,
    kinds: &[AllocatorKind],
    config: &RunConfig,
    seed: u64,
) -> Result<ComparisonReport, HarnessError> {
    config.validate()?;
    let mut runs = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        eprintln!("Running {kind} (seed=0x{seed:X})");
        runs.push(run_subprocess(exe, kind, config, seed)?);
    }
    Ok(ComparisonReport {
        seed,
        config: *config,
        runs,
    })
}

impl ComparisonReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Markdown table of each backend's final metrics and counters.
    #[must_use]
    pub fn render_markdown(&self) -> String {
        let c = &self.config;
        let mut out = String::new();

        writeln!(out, "# heapchurn allocator comparison").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "- Workload: seed=0x{:016X} iterations={} max_allocations={} sizes={}..={} bytes",
            self.seed, c.iterations, c.max_allocations, c.min_size, c.max_size
        )
        .ok();
        writeln!(
            out,
            "- Generated: one child process per allocator (clean heap, identical operation sequence)"
        )
        .ok();
        writeln!(out).ok();

        writeln!(
            out,
            "| allocator | live | tracked bytes | largest free block | process memory | refusals | peak live | elapsed ms |"
        )
        .ok();
        writeln!(
            out,
            "|-----------|-----:|--------------:|-------------------:|---------------:|---------:|----------:|-----------:|"
        )
        .ok();
        for run in &self.runs {
            let s = &run.summary;
            let row = match run.final_metrics() {
                Some(m) => writeln!(
                    out,
                    "| {} | {} | {} | {} | {} | {} | {} | {} |",
                    run.allocator,
                    m.live_allocations,
                    m.tracked_bytes,
                    m.largest_free_block,
                    m.process_memory_bytes,
                    s.counters.refusals,
                    s.counters.peak_live,
                    s.elapsed_ms
                ),
                None => writeln!(
                    out,
                    "| {} | - | - | - | - | {} | {} | {} |",
                    run.allocator, s.counters.refusals, s.counters.peak_live, s.elapsed_ms
                ),
            };
            row.ok();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RunSummary;
    use heapchurn_core::{MetricsRecord, RunCounters};

    fn report(allocator: &str, rss: u64, elapsed_ms: u64) -> RunReport {
        RunReport {
            allocator: allocator.to_string(),
            seed: 7,
            config: RunConfig::default(),
            metrics: vec![MetricsRecord {
                step: 99_000,
                live_allocations: 5000,
                tracked_bytes: 680_000,
                largest_free_block: 10 * 1024 * 1024,
                process_memory_bytes: rss,
            }],
            summary: RunSummary {
                allocator: allocator.to_string(),
                seed: 7,
                elapsed_ms,
                counters: RunCounters {
                    peak_live: 5100,
                    ..RunCounters::default()
                },
            },
            stats: None,
        }
    }

    #[test]
    fn run_args_reproduce_config() {
        let cfg = RunConfig {
            iterations: 500,
            ..RunConfig::default()
        };
        let args = run_args(AllocatorKind::System, &cfg, 0xABC);
        assert_eq!(&args[..3], ["run", "--format", "json"]);
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap() + 1;
        assert_eq!(args[pos("--allocator")], "system");
        assert_eq!(args[pos("--seed")], "0xABC");
        assert_eq!(args[pos("--iterations")], "500");
        assert_eq!(args[pos("--probe-high")], (10 * 1024 * 1024).to_string());
    }

    #[test]
    fn markdown_has_one_row_per_allocator() {
        let cmp = ComparisonReport {
            seed: 7,
            config: RunConfig::default(),
            runs: vec![report("system", 9_000_000, 40), report("mimalloc", 7_000_000, 31)],
        };
        let md = cmp.render_markdown();
        assert!(md.contains("| system | 5000 | 680000 | 10485760 | 9000000 | 0 | 5100 | 40 |"));
        assert!(md.contains("| mimalloc | 5000 | 680000 | 10485760 | 7000000 | 0 | 5100 | 31 |"));
    }

    #[test]
    fn run_without_metrics_renders_dashes() {
        let mut empty = report("system", 0, 1);
        empty.metrics.clear();
        let cmp = ComparisonReport {
            seed: 7,
            config: RunConfig::default(),
            runs: vec![empty],
        };
        assert!(cmp.render_markdown().contains("| system | - | - | - | - |"));
    }
}
