//! Deterministic bookkeeping allocator.
//!
//! Hands out unique, never-reused fake addresses from a bump pointer. Only
//! live blocks are stored: a release of a non-live address below the bump
//! pointer is a double release, anything else is foreign. Both are counted
//! instead of crashing, so tests can assert the single-release contract after
//! the fact.

use std::collections::BTreeMap;
use std::ptr::NonNull;

use super::{Allocator, Handle};

const BASE_ADDR: usize = 0x1000;
const GRANULE: usize = 16;

#[derive(Debug, Clone)]
pub struct FakeAllocator {
    next_addr: usize,
    /// Requests larger than this are refused.
    max_request: Option<usize>,
    /// Requests that would push live bytes past this are refused.
    byte_budget: Option<usize>,
    live: BTreeMap<usize, usize>,
    live_bytes: usize,
    allocations: u64,
    releases: u64,
    refusals: u64,
    double_releases: u64,
    foreign_releases: u64,
    largest_granted: usize,
}

impl FakeAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_addr: BASE_ADDR,
            max_request: None,
            byte_budget: None,
            live: BTreeMap::new(),
            live_bytes: 0,
            allocations: 0,
            releases: 0,
            refusals: 0,
            double_releases: 0,
            foreign_releases: 0,
            largest_granted: 0,
        }
    }

    /// Refuse any single request above `max_request` bytes.
    #[must_use]
    pub fn with_max_request(mut self, max_request: usize) -> Self {
        self.max_request = Some(max_request);
        self
    }

    /// Refuse requests once live bytes would exceed `budget`.
    #[must_use]
    pub fn with_byte_budget(mut self, budget: usize) -> Self {
        self.byte_budget = Some(budget);
        self
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    #[must_use]
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    #[must_use]
    pub fn releases(&self) -> u64 {
        self.releases
    }

    #[must_use]
    pub fn refusals(&self) -> u64 {
        self.refusals
    }

    /// Double plus foreign releases. Zero for a correct client.
    #[must_use]
    pub fn violations(&self) -> u64 {
        self.double_releases + self.foreign_releases
    }

    /// Largest request ever satisfied.
    #[must_use]
    pub fn largest_granted(&self) -> usize {
        self.largest_granted
    }

    #[must_use]
    pub fn is_live(&self, handle: Handle) -> bool {
        self.live.contains_key(&handle.addr())
    }

    fn refuses(&self, size: usize) -> bool {
        if self.max_request.is_some_and(|max| size > max) {
            return true;
        }
        self.byte_budget
            .is_some_and(|budget| self.live_bytes.saturating_add(size) > budget)
    }

    /// Whether `addr` lies on a granule boundary this allocator has already
    /// handed out. Interior granules of multi-granule blocks also match.
    fn was_issued(&self, addr: usize) -> bool {
        (BASE_ADDR..self.next_addr).contains(&addr) && (addr - BASE_ADDR) % GRANULE == 0
    }
}

impl Default for FakeAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Allocator for FakeAllocator {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn allocate(&mut self, size: usize) -> Option<Handle> {
        if self.refuses(size) {
            self.refusals += 1;
            return None;
        }
        let span = size.max(1).checked_next_multiple_of(GRANULE)?;
        let addr = self.next_addr;
        self.next_addr = self.next_addr.checked_add(span)?;

        let ptr = NonNull::new(std::ptr::without_provenance_mut::<u8>(addr))?;
        // SAFETY: the address is unique to this allocator and never
        // dereferenced; it is only compared and returned to `release`.
        let handle = unsafe { Handle::from_raw(ptr) };

        self.live.insert(addr, size);
        self.live_bytes += size;
        self.allocations += 1;
        self.largest_granted = self.largest_granted.max(size);
        Some(handle)
    }

    fn release(&mut self, handle: Handle) {
        let addr = handle.addr();
        match self.live.remove(&addr) {
            Some(size) => {
                self.live_bytes -= size;
                self.releases += 1;
            }
            None if self.was_issued(addr) => self.double_releases += 1,
            None => self.foreign_releases += 1,
        }
    }

    fn dump_stats(&self) -> Option<String> {
        Some(format!(
            "fake allocator: live={} live_bytes={} allocations={} releases={} refusals={} violations={}",
            self.live.len(),
            self.live_bytes,
            self.allocations,
            self.releases,
            self.refusals,
            self.violations()
        ))
    }
}
