//! Run configuration.
//!
//! A [`RunConfig`] is fixed for the lifetime of a run. The defaults describe a
//! small-object churn: up to 10 000 live blocks of 16..=256 bytes over 100 000
//! steps, sampled every 1 000 steps.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::probe::ProbeBounds;

pub const DEFAULT_MAX_ALLOCATIONS: usize = 10_000;
pub const DEFAULT_MIN_SIZE: usize = 16;
pub const DEFAULT_MAX_SIZE: usize = 256;
pub const DEFAULT_ITERATIONS: u64 = 100_000;
pub const DEFAULT_REPORT_INTERVAL: u64 = 1_000;

/// Workload shape for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Ceiling on simultaneously tracked allocations.
    pub max_allocations: usize,
    /// Smallest allocation size in bytes (inclusive).
    pub min_size: usize,
    /// Largest allocation size in bytes (inclusive).
    pub max_size: usize,
    /// Total number of workload steps.
    pub iterations: u64,
    /// Emit a metrics record every this many steps.
    pub report_interval: u64,
    /// Search range for the fragmentation probe.
    pub probe: ProbeBounds,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_allocations: DEFAULT_MAX_ALLOCATIONS,
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            iterations: DEFAULT_ITERATIONS,
            report_interval: DEFAULT_REPORT_INTERVAL,
            probe: ProbeBounds::default(),
        }
    }
}

impl RunConfig {
    /// Check that the configuration describes a runnable workload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_size == 0 {
            return Err(ConfigError::ZeroMinSize);
        }
        if self.min_size > self.max_size {
            return Err(ConfigError::EmptySizeRange {
                min: self.min_size,
                max: self.max_size,
            });
        }
        if self.max_allocations == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.report_interval == 0 {
            return Err(ConfigError::ZeroReportInterval);
        }
        self.probe.validate()
    }

    /// Number of metrics records a full run emits.
    #[must_use]
    pub fn expected_reports(&self) -> u64 {
        if self.report_interval == 0 {
            return 0;
        }
        self.iterations.div_ceil(self.report_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(RunConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_inverted_size_range() {
        let cfg = RunConfig {
            min_size: 512,
            max_size: 64,
            ..RunConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::EmptySizeRange { min: 512, max: 64 })
        );
    }

    #[test]
    fn rejects_zero_fields() {
        let zero_min = RunConfig {
            min_size: 0,
            ..RunConfig::default()
        };
        assert_eq!(zero_min.validate(), Err(ConfigError::ZeroMinSize));

        let zero_cap = RunConfig {
            max_allocations: 0,
            ..RunConfig::default()
        };
        assert_eq!(zero_cap.validate(), Err(ConfigError::ZeroCapacity));

        let zero_interval = RunConfig {
            report_interval: 0,
            ..RunConfig::default()
        };
        assert_eq!(zero_interval.validate(), Err(ConfigError::ZeroReportInterval));
    }

    #[test]
    fn rejects_bad_probe_bounds() {
        let cfg = RunConfig {
            probe: ProbeBounds { low: 4096, high: 1024 },
            ..RunConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::EmptyProbeRange {
                low: 4096,
                high: 1024
            })
        );
    }

    #[test]
    fn expected_reports_counts_step_zero() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.expected_reports(), 100);

        let odd = RunConfig {
            iterations: 1_001,
            report_interval: 1_000,
            ..RunConfig::default()
        };
        // Steps 0 and 1000.
        assert_eq!(odd.expected_reports(), 2);
    }
}
