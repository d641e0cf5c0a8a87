//! Run Aggregator: folds partials into the canonical coverage model
//!
//! Merge is a per-location set union, which makes it commutative,
//! associative and idempotent: partials from concurrent shards can arrive in
//! any order and retried runs can be merged again without changing the
//! result.
//!
//! A single writer lock serializes merges. Validation against the source map
//! happens before the lock is taken, so the critical section is only the
//! union itself. Snapshots take the read side and therefore see every merge
//! either completely or not at all.

use crate::config::CoverageConfig;
use crate::diagnostics::{Diagnostics, MergeDiagnostic};
use crate::ids::{SourceLocation, TestId};
use crate::line_coverage::{LineCoverage, TestRegistration};
use crate::source_map::SourceMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Result of one merge call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Known locations folded into the canonical model
    pub merged_locations: usize,
    /// (location, test) memberships that were not present before
    pub new_memberships: usize,
    /// Locations skipped because the source map does not contain them
    pub unknown_locations: usize,
    /// Problems found in this partial
    pub diagnostics: Vec<MergeDiagnostic>,
}

impl MergeReport {
    /// Whether the partial merged without diagnostics
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Add another report's counts and diagnostics to this one
    pub fn absorb(&mut self, other: MergeReport) {
        self.merged_locations += other.merged_locations;
        self.new_memberships += other.new_memberships;
        self.unknown_locations += other.unknown_locations;
        self.diagnostics.extend(other.diagnostics);
    }
}

/// Point-in-time counters of the canonical model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    /// Merge calls applied
    pub merges: u64,
    /// Distinct covered locations
    pub locations: usize,
    /// Total (location, test) memberships
    pub memberships: usize,
    /// Registered tests
    pub tests: usize,
    /// Diagnostics recorded
    pub diagnostics: u64,
    /// Distinct locations reported unknown
    pub unknown_locations: usize,
}

#[derive(Debug, Default)]
struct AggregateState {
    coverage: LineCoverage,
    diagnostics: Diagnostics,
    merges: u64,
}

/// Owner of the canonical coverage for one session
#[derive(Debug)]
pub struct RunAggregator {
    source_map: Arc<SourceMap>,
    state: RwLock<AggregateState>,
}

impl RunAggregator {
    /// Create an aggregator with default configuration
    #[must_use]
    pub fn new(source_map: Arc<SourceMap>) -> Self {
        Self::with_config(source_map, &CoverageConfig::default())
    }

    /// Create an aggregator honouring the diagnostic cap in `config`
    #[must_use]
    pub fn with_config(source_map: Arc<SourceMap>, config: &CoverageConfig) -> Self {
        Self {
            source_map,
            state: RwLock::new(AggregateState {
                coverage: LineCoverage::new(),
                diagnostics: Diagnostics::with_limit(config.max_diagnostics),
                merges: 0,
            }),
        }
    }

    /// The source map partials are validated against
    #[must_use]
    pub fn source_map(&self) -> &Arc<SourceMap> {
        &self.source_map
    }

    /// Fold a partial into the canonical model
    ///
    /// Locations missing from the source map are reported as
    /// [`MergeDiagnostic::UnknownLocation`] and skipped; every other location
    /// in the same partial is still merged.
    pub fn merge(&self, partial: LineCoverage) -> MergeReport {
        let (hits, tests) = partial.into_parts();

        let mut report = MergeReport::default();
        let mut known: Vec<(SourceLocation, BTreeSet<TestId>)> = Vec::with_capacity(hits.len());
        for (location, test_set) in hits {
            if self.source_map.contains(location) {
                known.push((location, test_set));
            } else {
                tracing::debug!(%location, tests = test_set.len(), "hit on unknown location");
                report.unknown_locations += 1;
                report.diagnostics.push(MergeDiagnostic::UnknownLocation {
                    location,
                    tests: test_set.len(),
                });
            }
        }

        let mut state = self.state.write();
        for identity in tests.into_values() {
            let test = identity.id;
            if let TestRegistration::Conflict { kept, discarded } =
                state.coverage.register_test(identity)
            {
                tracing::warn!(%test, %kept, %discarded, "conflicting test names");
                report
                    .diagnostics
                    .push(MergeDiagnostic::ConflictingTestName {
                        test,
                        kept,
                        discarded,
                    });
            }
        }
        for (location, test_set) in known {
            report.new_memberships += state.coverage.union_location(location, test_set);
            report.merged_locations += 1;
        }
        state.diagnostics.extend(report.diagnostics.iter().cloned());
        state.merges += 1;
        let merges = state.merges;
        drop(state);

        if report.unknown_locations > 0 {
            tracing::warn!(
                unknown = report.unknown_locations,
                merged = report.merged_locations,
                "partial referenced locations missing from the source map"
            );
        }
        tracing::debug!(
            merge = merges,
            merged = report.merged_locations,
            new_memberships = report.new_memberships,
            "partial merged"
        );
        report
    }

    /// Merge several partials, returning the combined report
    pub fn merge_all(&self, partials: impl IntoIterator<Item = LineCoverage>) -> MergeReport {
        let mut combined = MergeReport::default();
        for partial in partials {
            combined.absorb(self.merge(partial));
        }
        combined
    }

    /// Consistent copy of the canonical model
    #[must_use]
    pub fn snapshot(&self) -> LineCoverage {
        self.state.read().coverage.clone()
    }

    /// Copy of the diagnostics recorded so far
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        self.state.read().diagnostics.clone()
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> AggregatorStats {
        let state = self.state.read();
        AggregatorStats {
            merges: state.merges,
            locations: state.coverage.len(),
            memberships: state.coverage.membership_count(),
            tests: state.coverage.test_count(),
            diagnostics: state.diagnostics.total(),
            unknown_locations: state.diagnostics.unknown_locations().len(),
        }
    }

    /// Tear down, yielding the canonical model and its diagnostics
    #[must_use]
    pub fn into_parts(self) -> (LineCoverage, Diagnostics) {
        let state = self.state.into_inner();
        (state.coverage, state.diagnostics)
    }
}
