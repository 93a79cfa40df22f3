//! Operation selection.
//!
//! Every random decision of a run (allocate or free, how many bytes, which
//! victim) comes from one [`Selector`]. The production selector wraps a
//! seedable [`StdRng`] that is seeded exactly once and never reseeded. The seed
//! comes from the OS-seeded thread generator unless a replay seed is supplied.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// What the workload does on one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Allocate,
    Free,
}

/// Source of the workload's random decisions.
pub trait Selector {
    /// Allocate or free, with equal probability.
    fn next_operation(&mut self) -> Operation;

    /// Allocation size, uniform over the configured inclusive range.
    fn next_size(&mut self) -> usize;

    /// Index uniform in `0..n`. Callers never pass `n == 0`.
    fn next_index(&mut self, n: usize) -> usize;
}

/// A fresh non-deterministic seed, drawn from the OS-seeded thread generator.
///
/// Runs record the seed they started from so any run can be replayed.
#[must_use]
pub fn random_seed() -> u64 {
    rand::random()
}

/// The production selector.
#[derive(Debug, Clone)]
pub struct RandomSelector {
    rng: StdRng,
    seed: u64,
    min_size: usize,
    max_size: usize,
}

impl RandomSelector {
    /// Seeded from [`random_seed`].
    #[must_use]
    pub fn from_os_rng(min_size: usize, max_size: usize) -> Self {
        Self::with_seed(random_seed(), min_size, max_size)
    }

    /// Deterministic stream for replaying a run.
    #[must_use]
    pub fn with_seed(seed: u64, min_size: usize, max_size: usize) -> Self {
        debug_assert!(min_size <= max_size);
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            min_size,
            max_size,
        }
    }

    /// The seed this selector started from.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Selector for RandomSelector {
    fn next_operation(&mut self) -> Operation {
        if self.rng.random_bool(0.5) {
            Operation::Allocate
        } else {
            Operation::Free
        }
    }

    fn next_size(&mut self) -> usize {
        self.rng.random_range(self.min_size..=self.max_size)
    }

    fn next_index(&mut self, n: usize) -> usize {
        self.rng.random_range(0..n)
    }
}
