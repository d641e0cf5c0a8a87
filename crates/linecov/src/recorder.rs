//! Per-Context Hit Recording (Muda Elimination)
//!
//! Each execution context (a worker running one test, or one parallel shard)
//! owns its own [`HitRecorder`]. Recording takes `&mut self` and touches no
//! shared state, so the hot path has no locks and no atomics. Contention is
//! moved to the single merge per context in
//! [`RunAggregator`](crate::RunAggregator).

use crate::ids::{HitEvent, SourceLocation, TestId, TestIdentity};
use crate::line_coverage::LineCoverage;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Default initial capacity of the location map
pub const DEFAULT_RECORDER_CAPACITY: usize = 256;

/// Sorted, deduplicated tests for one location; almost always a single test
type LocalTests = SmallVec<[TestId; 1]>;

/// Accumulates hits for one execution context
#[derive(Debug)]
pub struct HitRecorder {
    hits: HashMap<SourceLocation, LocalTests>,
    tests: Vec<TestIdentity>,
    current: Option<TestId>,
    capacity: usize,
    epoch: u64,
    next_sequence: u64,
    hits_observed: u64,
    hits_dropped: u64,
}

impl HitRecorder {
    /// Create a recorder with the default capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RECORDER_CAPACITY)
    }

    /// Create a recorder sized for roughly `capacity` distinct locations
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            hits: HashMap::with_capacity(capacity),
            tests: Vec::new(),
            current: None,
            capacity,
            epoch: 0,
            next_sequence: 0,
            hits_observed: 0,
            hits_dropped: 0,
        }
    }

    /// Start attributing hits to a test
    pub fn begin_test(&mut self, identity: TestIdentity) {
        self.current = Some(identity.id);
        if !self.tests.iter().any(|t| t == &identity) {
            self.tests.push(identity);
        }
    }

    /// Stop attributing hits to the current test
    pub fn end_test(&mut self) {
        self.current = None;
    }

    /// Test currently receiving hits
    #[must_use]
    pub fn current_test(&self) -> Option<TestId> {
        self.current
    }

    /// Record a hit by an explicit test
    ///
    /// This is the hot path.
    #[inline]
    pub fn record(&mut self, location: SourceLocation, test: TestId) {
        self.hits_observed += 1;
        self.next_sequence += 1;
        let tests = self.hits.entry(location).or_default();
        if let Err(pos) = tests.binary_search(&test) {
            tests.insert(pos, test);
        }
    }

    /// Record a hit by the current test
    ///
    /// Hits outside any test cannot be attributed and are dropped.
    #[inline]
    pub fn record_hit(&mut self, location: SourceLocation) {
        match self.current {
            Some(test) => self.record(location, test),
            None => self.hits_dropped += 1,
        }
    }

    /// Record a hit event emitted by instrumentation
    pub fn record_event(&mut self, event: HitEvent) {
        self.record(event.location, event.test);
        self.next_sequence = self.next_sequence.max(event.sequence.saturating_add(1));
    }

    /// Build the next event for the current test, without recording it
    #[must_use]
    pub fn next_event(&self, location: SourceLocation) -> Option<HitEvent> {
        self.current
            .map(|test| HitEvent::new(location, test, self.next_sequence))
    }

    /// Take the accumulated partial and reset to empty
    ///
    /// Draining twice returns an empty coverage the second time. Recording
    /// may continue afterwards and starts a new epoch.
    #[must_use]
    pub fn drain(&mut self) -> LineCoverage {
        let hits = std::mem::replace(&mut self.hits, HashMap::with_capacity(self.capacity));
        let tests = std::mem::take(&mut self.tests);
        self.epoch += 1;

        let mut partial = LineCoverage::new();
        for identity in tests {
            let _ = partial.register_test(identity);
        }
        // Keep the current test registered for the next epoch
        if let Some(current) = self.current {
            if let Some(identity) = partial.test(current).cloned() {
                self.tests.push(identity);
            }
        }
        for (location, tests) in hits {
            let _ = partial.union_location(location, tests);
        }
        partial
    }

    /// Discard all pending hits without draining (aborted context)
    pub fn abandon(self) {
        if !self.hits.is_empty() {
            tracing::debug!(
                pending = self.hits.len(),
                epoch = self.epoch,
                "recorder abandoned with pending hits"
            );
        }
    }

    /// Whether nothing is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Distinct locations pending
    #[must_use]
    pub fn pending_locations(&self) -> usize {
        self.hits.len()
    }

    /// Tests attributed to a pending location
    #[must_use]
    pub fn pending_tests(&self, location: SourceLocation) -> &[TestId] {
        self.hits
            .get(&location)
            .map(|tests| tests.as_slice())
            .unwrap_or(&[])
    }

    /// Number of completed drains
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Hits recorded over the recorder's lifetime
    #[must_use]
    pub fn hits_observed(&self) -> u64 {
        self.hits_observed
    }

    /// Hits dropped because no test was active
    #[must_use]
    pub fn hits_dropped(&self) -> u64 {
        self.hits_dropped
    }
}

impl Default for HitRecorder {
    fn default() -> Self {
        Self::new()
    }
}
