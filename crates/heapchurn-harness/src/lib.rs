//! Tooling around the heapchurn workload engine.
//!
//! This crate provides:
//! - Run execution: drive one workload against a chosen backend and collect a report
//! - Structured logging: JSONL run logs with schema validation
//! - Reports: plain console output, JSON, and markdown
//! - Comparison: one child process per backend, rendered side by side

#![forbid(unsafe_code)]

pub mod compare;
pub mod error;
pub mod report;
pub mod runner;
pub mod structured_log;

pub use compare::ComparisonReport;
pub use error::HarnessError;
pub use report::{RunReport, RunSummary};
pub use runner::{RunRequest, execute, execute_with};

/// Parse a seed given as decimal or `0x` hex, with optional `_` separators.
pub fn parse_seed(raw: &str) -> Result<u64, HarnessError> {
    let s = raw.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(&hex.replace('_', ""), 16)
    } else {
        s.replace('_', "").parse::<u64>()
    };
    parsed.map_err(|_| HarnessError::InvalidSeed(raw.to_string()))
}
