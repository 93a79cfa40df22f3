//! Fragmentation probe.
//!
//! Estimates the largest block the allocator can hand out right now by binary
//! searching over a size range with real trial allocations, each released
//! immediately. This is black-box probing and carries two inherent limits:
//!
//! - it measures the largest single contiguous block satisfiable at this
//!   moment, not total free memory;
//! - its own trial allocations perturb the allocator state it is measuring.
//!
//! Cost is O(log(high - low)) allocate/release pairs, which is why the driver
//! only probes at the reporting cadence.

use serde::{Deserialize, Serialize};

use crate::backend::Allocator;
use crate::error::ConfigError;

pub const DEFAULT_PROBE_LOW: usize = 1024;
pub const DEFAULT_PROBE_HIGH: usize = 10 * 1024 * 1024;

/// Inclusive search range in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeBounds {
    pub low: usize,
    pub high: usize,
}

impl Default for ProbeBounds {
    fn default() -> Self {
        Self {
            low: DEFAULT_PROBE_LOW,
            high: DEFAULT_PROBE_HIGH,
        }
    }
}

impl ProbeBounds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.low == 0 {
            return Err(ConfigError::ZeroProbeLow);
        }
        if self.low > self.high {
            return Err(ConfigError::EmptyProbeRange {
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Largest size that succeeded, or 0 if none did.
    pub largest_block: usize,
    /// Trial allocations issued.
    pub attempts: u32,
    /// Trial allocations the allocator satisfied.
    pub successes: u32,
}

/// Binary search for the largest satisfiable request in `bounds`.
///
/// Every successful trial allocation is released before the next one, so the
/// probe leaves no allocation behind. An empty range (`low > high`) yields 0.
pub fn probe_largest_block<A: Allocator + ?Sized>(
    allocator: &mut A,
    bounds: ProbeBounds,
) -> ProbeOutcome {
    let mut outcome = ProbeOutcome::default();
    // Zero-byte requests say nothing about fragmentation.
    let mut low = bounds.low.max(1);
    let mut high = bounds.high;

    while low <= high {
        let mid = low + (high - low) / 2;
        outcome.attempts += 1;
        match allocator.allocate(mid) {
            Some(handle) => {
                allocator.release(handle);
                outcome.successes += 1;
                outcome.largest_block = mid;
                match mid.checked_add(1) {
                    Some(next) => low = next,
                    None => break,
                }
            }
            // mid >= 1, so this cannot underflow.
            None => high = mid - 1,
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeAllocator;

    #[test]
    fn finds_exact_threshold() {
        let mut fake = FakeAllocator::new().with_max_request(500);
        let out = probe_largest_block(&mut fake, ProbeBounds { low: 100, high: 1000 });
        assert_eq!(out.largest_block, 500);
        assert!(out.attempts > out.successes);
        assert_eq!(fake.live_count(), 0);
        assert_eq!(fake.violations(), 0);
    }

    #[test]
    fn unconstrained_allocator_reaches_high() {
        let mut fake = FakeAllocator::new();
        let out = probe_largest_block(&mut fake, ProbeBounds::default());
        assert_eq!(out.largest_block, DEFAULT_PROBE_HIGH);
        assert_eq!(out.attempts, out.successes);
        assert_eq!(fake.live_count(), 0);
    }

    #[test]
    fn threshold_below_range_yields_zero() {
        let mut fake = FakeAllocator::new().with_max_request(50);
        let out = probe_largest_block(&mut fake, ProbeBounds { low: 100, high: 1000 });
        assert_eq!(out.largest_block, 0);
        assert_eq!(out.successes, 0);
    }

    #[test]
    fn empty_range_yields_zero_without_allocating() {
        let mut fake = FakeAllocator::new();
        let out = probe_largest_block(&mut fake, ProbeBounds { low: 2048, high: 1024 });
        assert_eq!(out, ProbeOutcome::default());
        assert_eq!(fake.allocations(), 0);
    }

    #[test]
    fn attempts_are_logarithmic() {
        let mut fake = FakeAllocator::new().with_max_request(3_000_000);
        let out = probe_largest_block(&mut fake, ProbeBounds::default());
        // ceil(log2(10 MiB - 1 KiB + 1)) + 1
        assert!(out.attempts <= 25, "attempts {}", out.attempts);
        assert_eq!(out.largest_block, 3_000_000);
    }

    #[test]
    fn top_of_address_space_does_not_overflow() {
        let mut fake = FakeAllocator::new().with_max_request(usize::MAX);
        let out = probe_largest_block(
            &mut fake,
            ProbeBounds {
                low: usize::MAX - 1,
                high: usize::MAX,
            },
        );
        // The fake cannot place blocks this large, so nothing succeeds; the
        // search must still terminate.
        assert!(out.largest_block == 0 || out.largest_block >= usize::MAX - 1);
    }

    #[test]
    fn bounds_validation() {
        assert_eq!(ProbeBounds::default().validate(), Ok(()));
        assert_eq!(
            ProbeBounds { low: 0, high: 10 }.validate(),
            Err(ConfigError::ZeroProbeLow)
        );
        assert_eq!(
            ProbeBounds { low: 1, high: 1 }.validate(),
            Ok(())
        );
    }
}
