//! Merge Diagnostics (Soft Jidoka)
//!
//! Coverage data is best-effort. A structurally broken source map stops
//! everything at build time, but data-quality problems found while merging
//! are logged, counted and reported next to a still-usable model:
//!
//! - Stale or foreign instrumentation (hits on unknown locations) -> log and
//!   continue, the hit is excluded
//! - Conflicting test names for one id -> warn, a deterministic name is kept

use crate::ids::{SourceLocation, TestId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Default cap on retained diagnostics
pub const DEFAULT_MAX_DIAGNOSTICS: usize = 1000;

/// How a diagnostic affects the merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticSeverity {
    /// Data was excluded; the rest of the partial was merged
    LogAndContinue,
    /// Data was kept, possibly altered
    Warn,
}

/// A recoverable problem found while merging a partial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeDiagnostic {
    /// The partial referenced a location the source map does not contain
    UnknownLocation {
        /// The offending location
        location: SourceLocation,
        /// How many tests claimed to hit it
        tests: usize,
    },
    /// One test id arrived with two different display names
    ConflictingTestName {
        /// The test id
        test: TestId,
        /// Name kept in the canonical model
        kept: String,
        /// Name that was dropped
        discarded: String,
    },
}

impl MergeDiagnostic {
    /// Classify severity
    #[must_use]
    pub const fn severity(&self) -> DiagnosticSeverity {
        match self {
            Self::UnknownLocation { .. } => DiagnosticSeverity::LogAndContinue,
            Self::ConflictingTestName { .. } => DiagnosticSeverity::Warn,
        }
    }

    /// Affected location, if any
    #[must_use]
    pub const fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::UnknownLocation { location, .. } => Some(*location),
            Self::ConflictingTestName { .. } => None,
        }
    }

    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::UnknownLocation { location, tests } => {
                format!("Unknown location {location} hit by {tests} test(s)")
            }
            Self::ConflictingTestName {
                test,
                kept,
                discarded,
            } => {
                format!("Test {test} named both '{kept}' and '{discarded}'; kept '{kept}'")
            }
        }
    }
}

/// Log of merge diagnostics with a bounded entry list
///
/// Every diagnostic is counted; only the first `limit` entries are retained.
/// The set of distinct unknown locations is not bounded: it is kept in full
/// so callers can tell which hits were excluded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<MergeDiagnostic>,
    unknown_locations: BTreeSet<SourceLocation>,
    limit: usize,
    total: u64,
}

impl Diagnostics {
    /// Create an empty log with the default cap
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_DIAGNOSTICS)
    }

    /// Create an empty log retaining at most `limit` entries
    ///
    /// A limit of 0 means [`DEFAULT_MAX_DIAGNOSTICS`].
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            unknown_locations: BTreeSet::new(),
            limit: if limit == 0 {
                DEFAULT_MAX_DIAGNOSTICS
            } else {
                limit
            },
            total: 0,
        }
    }

    /// Record a diagnostic
    pub fn record(&mut self, diagnostic: MergeDiagnostic) {
        self.total += 1;
        if let Some(location) = diagnostic.location() {
            let _ = self.unknown_locations.insert(location);
        }
        if self.entries.len() < self.limit {
            self.entries.push(diagnostic);
        }
    }

    /// Append another log
    pub fn extend(&mut self, other: impl IntoIterator<Item = MergeDiagnostic>) {
        for diagnostic in other {
            self.record(diagnostic);
        }
    }

    /// Retained diagnostics in arrival order
    #[must_use]
    pub fn entries(&self) -> &[MergeDiagnostic] {
        &self.entries
    }

    /// Whether a location was ever reported unknown
    #[must_use]
    pub fn is_unknown(&self, location: SourceLocation) -> bool {
        self.unknown_locations.contains(&location)
    }

    /// Distinct unknown locations
    #[must_use]
    pub fn unknown_locations(&self) -> &BTreeSet<SourceLocation> {
        &self.unknown_locations
    }

    /// Diagnostics recorded, including those not retained
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Diagnostics counted but not retained
    #[must_use]
    pub fn suppressed(&self) -> u64 {
        self.total - self.entries.len() as u64
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Count of retained diagnostics with the given severity
    #[must_use]
    pub fn count_by_severity(&self, severity: DiagnosticSeverity) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity() == severity)
            .count()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::FileId;

    fn unknown(line: u32) -> MergeDiagnostic {
        MergeDiagnostic::UnknownLocation {
            location: SourceLocation::new(FileId::new(9), line),
            tests: 1,
        }
    }

    #[test]
    fn test_severity_classification() {
        assert_eq!(unknown(1).severity(), DiagnosticSeverity::LogAndContinue);
        let conflict = MergeDiagnostic::ConflictingTestName {
            test: TestId::new(1),
            kept: "a".to_string(),
            discarded: "b".to_string(),
        };
        assert_eq!(conflict.severity(), DiagnosticSeverity::Warn);
        assert!(conflict.location().is_none());
    }

    #[test]
    fn test_description_mentions_location() {
        assert_eq!(
            unknown(77).description(),
            "Unknown location 9:77 hit by 1 test(s)"
        );
    }

    #[test]
    fn test_limit_retains_first_and_counts_all() {
        let mut diags = Diagnostics::with_limit(2);
        diags.extend([unknown(1), unknown(2), unknown(3)]);
        assert_eq!(diags.entries().len(), 2);
        assert_eq!(diags.total(), 3);
        assert_eq!(diags.suppressed(), 1);
        assert!(diags.is_unknown(SourceLocation::new(FileId::new(9), 3)));
        assert_eq!(diags.unknown_locations().len(), 3);
    }

    #[test]
    fn test_zero_limit_means_default() {
        let mut diags = Diagnostics::with_limit(0);
        diags.record(unknown(1));
        assert_eq!(diags.entries().len(), 1);
        assert_eq!(diags.suppressed(), 0);
    }

    #[test]
    fn test_count_by_severity() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_empty());
        diags.record(unknown(1));
        diags.record(MergeDiagnostic::ConflictingTestName {
            test: TestId::new(2),
            kept: "x".to_string(),
            discarded: "y".to_string(),
        });
        assert_eq!(diags.count_by_severity(DiagnosticSeverity::Warn), 1);
        assert_eq!(diags.count_by_severity(DiagnosticSeverity::LogAndContinue), 1);
    }
}
