//! Run reports.
//!
//! A [`RunReport`] is everything one workload run produced. It renders three
//! ways: the plain console transcript, JSON (the wire format between
//! `compare` and its child processes), and markdown.

use std::fmt::Write as _;

use heapchurn_core::{MetricsRecord, RunConfig, RunCounters};
use serde::{Deserialize, Serialize};

/// Counters plus run identity and wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub allocator: String,
    pub seed: u64,
    /// Workload loop plus drain, in milliseconds.
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub counters: RunCounters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub allocator: String,
    pub seed: u64,
    pub config: RunConfig,
    pub metrics: Vec<MetricsRecord>,
    pub summary: RunSummary,
    /// Allocator statistics dump; `None` when unsupported or skipped.
    pub stats: Option<String>,
}

impl RunReport {
    /// Last metrics record, if any step hit the reporting cadence.
    #[must_use]
    pub fn final_metrics(&self) -> Option<&MetricsRecord> {
        self.metrics.last()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Console transcript: one line per metrics record, the total run time,
    /// then the statistics section.
    #[must_use]
    pub fn to_plain(&self) -> String {
        let mut out = String::new();
        for record in &self.metrics {
            writeln!(out, "{record}").ok();
        }
        out.push_str(&self.plain_footer());
        out
    }

    /// Everything [`RunReport::to_plain`] prints after the metrics lines.
    #[must_use]
    pub fn plain_footer(&self) -> String {
        let mut out = String::new();
        writeln!(out, "Total run time: {} ms", self.summary.elapsed_ms).ok();
        writeln!(out).ok();
        writeln!(out, "=== Final {} stats ===", self.allocator).ok();
        match &self.stats {
            Some(stats) => {
                out.push_str(stats);
                if !stats.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => {
                writeln!(out, "{} statistics unavailable.", self.allocator).ok();
            }
        }
        out
    }

    #[must_use]
    pub fn to_markdown(&self) -> String {
        let c = &self.config;
        let s = &self.summary.counters;
        let mut out = String::new();

        writeln!(out, "# heapchurn run: {}", self.allocator).ok();
        writeln!(out).ok();
        writeln!(
            out,
            "- Workload: seed=0x{:016X} iterations={} max_allocations={} sizes={}..={} bytes",
            self.seed, c.iterations, c.max_allocations, c.min_size, c.max_size
        )
        .ok();
        writeln!(
            out,
            "- Probe: {}..={} bytes every {} steps",
            c.probe.low, c.probe.high, c.report_interval
        )
        .ok();
        writeln!(out, "- Elapsed: {} ms", self.summary.elapsed_ms).ok();
        writeln!(out).ok();

        writeln!(out, "## Metrics").ok();
        writeln!(out).ok();
        writeln!(
            out,
            "| step | live | tracked bytes | largest free block | process memory |"
        )
        .ok();
        writeln!(
            out,
            "|-----:|-----:|--------------:|-------------------:|---------------:|"
        )
        .ok();
        for r in &self.metrics {
            writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                r.step,
                r.live_allocations,
                r.tracked_bytes,
                r.largest_free_block,
                r.process_memory_bytes
            )
            .ok();
        }
        writeln!(out).ok();

        writeln!(out, "## Counters").ok();
        writeln!(out).ok();
        writeln!(out, "| Counter | value |").ok();
        writeln!(out, "|---------|------:|").ok();
        for (name, value) in [
            ("steps", s.steps),
            ("allocate attempts", s.allocate_attempts),
            ("allocations", s.allocations),
            ("refusals", s.refusals),
            ("capacity skips", s.capacity_skips),
            ("frees", s.frees),
            ("empty-registry skips", s.empty_skips),
            ("peak live", s.peak_live as u64),
            ("peak tracked bytes", s.peak_tracked_bytes as u64),
            ("drained", s.drained),
            ("probes", s.probes),
            ("probe attempts", s.probe_attempts),
        ] {
            writeln!(out, "| {name} | {value} |").ok();
        }

        if let Some(stats) = &self.stats {
            writeln!(out).ok();
            writeln!(out, "## Allocator statistics").ok();
            writeln!(out).ok();
            writeln!(out, "```text").ok();
            out.push_str(stats.trim_end());
            writeln!(out).ok();
            writeln!(out, "```").ok();
        }
        out
    }
}
