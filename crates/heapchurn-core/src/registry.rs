//! Live-allocation registry.
//!
//! Holds every allocation the workload currently owns. Order carries no
//! meaning, so removal is a swap-remove. The tracked byte total is maintained
//! incrementally on every mutation.
//!
//! The registry never releases memory. Whoever removes a record owns the
//! handle and must hand it back to the allocator.

use crate::backend::Handle;
use crate::selector::Selector;

/// One live allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRecord {
    pub handle: Handle,
    pub size: usize,
}

#[derive(Debug)]
pub struct AllocationRegistry {
    records: Vec<AllocationRecord>,
    capacity: usize,
    tracked_bytes: usize,
}

impl AllocationRegistry {
    /// Empty registry holding at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
            tracked_bytes: 0,
        }
    }

    /// Track a new allocation.
    ///
    /// Returns `false` and changes nothing when the registry is full; the
    /// caller still owns `handle` in that case.
    #[must_use = "a rejected handle must be released by the caller"]
    pub fn add(&mut self, handle: Handle, size: usize) -> bool {
        if self.is_full() {
            return false;
        }
        self.records.push(AllocationRecord { handle, size });
        self.tracked_bytes += size;
        true
    }

    /// Remove a uniformly chosen record, drawing the index from `selector`.
    ///
    /// Returns `None` without touching the selector when empty.
    pub fn remove_random<S: Selector + ?Sized>(
        &mut self,
        selector: &mut S,
    ) -> Option<AllocationRecord> {
        let len = self.records.len();
        if len == 0 {
            return None;
        }
        let index = selector.next_index(len);
        debug_assert!(index < len, "selector index {index} out of 0..{len}");
        let record = self.records.swap_remove(index.min(len - 1));
        self.tracked_bytes -= record.size;
        Some(record)
    }

    /// Take every record, leaving the registry empty.
    pub fn drain_all(&mut self) -> Vec<AllocationRecord> {
        self.tracked_bytes = 0;
        std::mem::take(&mut self.records)
    }

    /// Number of live records.
    #[must_use]
    pub fn size(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of the sizes of all live records.
    #[must_use]
    pub fn tracked_bytes(&self) -> usize {
        self.tracked_bytes
    }

    pub fn iter(&self) -> impl Iterator<Item = &AllocationRecord> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Allocator, FakeAllocator};
    use crate::selector::{Operation, RandomSelector};

    /// Always picks the last index.
    struct LastIndex;

    impl Selector for LastIndex {
        fn next_operation(&mut self) -> Operation {
            Operation::Free
        }
        fn next_size(&mut self) -> usize {
            1
        }
        fn next_index(&mut self, n: usize) -> usize {
            n - 1
        }
    }

    #[test]
    fn add_tracks_count_and_bytes() {
        let mut fake = FakeAllocator::new();
        let mut reg = AllocationRegistry::new(8);
        for size in [10, 20, 30] {
            let h = fake.allocate(size).unwrap();
            assert!(reg.add(h, size));
        }
        assert_eq!(reg.size(), 3);
        assert_eq!(reg.tracked_bytes(), 60);
        for rec in reg.drain_all() {
            fake.release(rec.handle);
        }
    }

    #[test]
    fn add_past_capacity_is_noop() {
        let mut fake = FakeAllocator::new();
        let mut reg = AllocationRegistry::new(2);
        let a = fake.allocate(5).unwrap();
        let b = fake.allocate(5).unwrap();
        let c = fake.allocate(5).unwrap();
        assert!(reg.add(a, 5));
        assert!(reg.add(b, 5));
        assert!(reg.is_full());
        assert!(!reg.add(c, 5));
        assert_eq!(reg.size(), 2);
        assert_eq!(reg.tracked_bytes(), 10);
        fake.release(c);
        for rec in reg.drain_all() {
            fake.release(rec.handle);
        }
        assert_eq!(fake.violations(), 0);
    }

    #[test]
    fn remove_random_swap_removes() {
        let mut fake = FakeAllocator::new();
        let mut reg = AllocationRegistry::new(4);
        let handles: Vec<_> = (1..=3).map(|s| fake.allocate(s).unwrap()).collect();
        for (i, h) in handles.iter().enumerate() {
            assert!(reg.add(*h, i + 1));
        }

        let removed = reg.remove_random(&mut LastIndex).unwrap();
        assert_eq!(removed.handle, handles[2]);
        assert_eq!(removed.size, 3);
        assert_eq!(reg.tracked_bytes(), 3);
        fake.release(removed.handle);

        for rec in reg.drain_all() {
            fake.release(rec.handle);
        }
        assert_eq!(fake.live_count(), 0);
    }

    #[test]
    fn remove_random_on_empty_returns_none() {
        let mut reg = AllocationRegistry::new(4);
        let mut sel = RandomSelector::with_seed(1, 16, 16);
        assert!(reg.remove_random(&mut sel).is_none());
        assert_eq!(reg.size(), 0);
    }

    #[test]
    fn drain_empties_and_resets_bytes() {
        let mut fake = FakeAllocator::new();
        let mut reg = AllocationRegistry::new(16);
        for _ in 0..10 {
            let h = fake.allocate(7).unwrap();
            assert!(reg.add(h, 7));
        }
        let drained = reg.drain_all();
        assert_eq!(drained.len(), 10);
        assert!(reg.is_empty());
        assert_eq!(reg.tracked_bytes(), 0);
        for rec in drained {
            fake.release(rec.handle);
        }
        assert_eq!(fake.releases(), 10);
        assert_eq!(fake.violations(), 0);
    }

    #[test]
    fn tracked_bytes_match_sum_under_random_churn() {
        let mut fake = FakeAllocator::new();
        let mut sel = RandomSelector::with_seed(0xA11CE, 1, 4096);
        let mut reg = AllocationRegistry::new(64);
        let mut adds = 0usize;
        let mut removes = 0usize;

        for _ in 0..5_000 {
            match sel.next_operation() {
                Operation::Allocate if !reg.is_full() => {
                    let size = sel.next_size();
                    let h = fake.allocate(size).unwrap();
                    assert!(reg.add(h, size));
                    adds += 1;
                }
                Operation::Allocate => {}
                Operation::Free => {
                    if let Some(rec) = reg.remove_random(&mut sel) {
                        fake.release(rec.handle);
                        removes += 1;
                    }
                }
            }
            assert_eq!(reg.size(), adds - removes);
            let sum: usize = reg.iter().map(|r| r.size).sum();
            assert_eq!(reg.tracked_bytes(), sum);
        }

        for rec in reg.drain_all() {
            fake.release(rec.handle);
        }
        assert_eq!(fake.violations(), 0);
        assert_eq!(fake.live_count(), 0);
    }
}
