//! Line Coverage: which tests executed which lines
//!
//! The value exchanged between recorders, the aggregator and the summarizer.
//! A location that is absent has never executed; a present location always
//! carries at least one test. Test sets are ordered so two coverages with the
//! same membership compare equal regardless of merge order.

use crate::ids::{FileId, SourceLocation, TestId, TestIdentity};
use crate::result::LinecovResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of registering a test identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestRegistration {
    /// First time this id was seen
    Added,
    /// Same id and name already present
    Existing,
    /// Same id with a different name; the smaller name is kept
    Conflict {
        /// Name now stored for the id
        kept: String,
        /// Name that lost
        discarded: String,
    },
}

/// Mapping from source location to the set of tests that hit it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CoverageWire", into = "CoverageWire")]
pub struct LineCoverage {
    hits: BTreeMap<SourceLocation, BTreeSet<TestId>>,
    tests: BTreeMap<TestId, TestIdentity>,
}

impl LineCoverage {
    /// Create an empty coverage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no location has been hit
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Number of hit locations
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Total (location, test) memberships
    #[must_use]
    pub fn membership_count(&self) -> usize {
        self.hits.values().map(BTreeSet::len).sum()
    }

    /// Record that `test` hit `location`; returns true if the membership is new
    pub fn insert(&mut self, location: SourceLocation, test: TestId) -> bool {
        self.hits.entry(location).or_default().insert(test)
    }

    /// Union a set of tests into one location; returns the number of new memberships
    pub fn union_location(
        &mut self,
        location: SourceLocation,
        tests: impl IntoIterator<Item = TestId>,
    ) -> usize {
        let mut tests = tests.into_iter().peekable();
        if tests.peek().is_none() {
            return 0;
        }
        let set = self.hits.entry(location).or_default();
        tests.filter(|test| set.insert(*test)).count()
    }

    /// Register a test identity
    ///
    /// When the id is already known under another name, the lexicographically
    /// smaller name is kept so the result does not depend on arrival order.
    pub fn register_test(&mut self, identity: TestIdentity) -> TestRegistration {
        match self.tests.get_mut(&identity.id) {
            None => {
                let _ = self.tests.insert(identity.id, identity);
                TestRegistration::Added
            }
            Some(existing) if existing.name == identity.name => TestRegistration::Existing,
            Some(existing) => {
                if identity.name < existing.name {
                    let discarded = std::mem::replace(&mut existing.name, identity.name);
                    TestRegistration::Conflict {
                        kept: existing.name.clone(),
                        discarded,
                    }
                } else {
                    TestRegistration::Conflict {
                        kept: existing.name.clone(),
                        discarded: identity.name,
                    }
                }
            }
        }
    }

    /// Tests that hit a location
    #[must_use]
    pub fn tests_at(&self, location: SourceLocation) -> Option<&BTreeSet<TestId>> {
        self.hits.get(&location)
    }

    /// Whether any test hit a location
    #[must_use]
    pub fn is_covered(&self, location: SourceLocation) -> bool {
        self.hits.contains_key(&location)
    }

    /// All hit locations in (file, line) order
    pub fn iter(&self) -> impl Iterator<Item = (&SourceLocation, &BTreeSet<TestId>)> {
        self.hits.iter()
    }

    /// Hit lines of one file in line order
    pub fn file_lines(&self, file: FileId) -> impl Iterator<Item = (u32, &BTreeSet<TestId>)> {
        self.hits
            .range(SourceLocation::new(file, 0)..=SourceLocation::new(file, u32::MAX))
            .map(|(loc, tests)| (loc.line, tests))
    }

    /// Look up a registered test
    #[must_use]
    pub fn test(&self, id: TestId) -> Option<&TestIdentity> {
        self.tests.get(&id)
    }

    /// Registered tests in id order
    pub fn tests(&self) -> impl Iterator<Item = &TestIdentity> {
        self.tests.values()
    }

    /// Number of registered tests
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    /// Split into hits and the test registry
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        BTreeMap<SourceLocation, BTreeSet<TestId>>,
        BTreeMap<TestId, TestIdentity>,
    ) {
        (self.hits, self.tests)
    }

    /// Serialize for hand-off to another process
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> LinecovResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a partial written by [`LineCoverage::to_json`]
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed
    pub fn from_json(json: &str) -> LinecovResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Wire form: JSON object keys must be strings, so locations become entries
#[derive(Serialize, Deserialize)]
struct CoverageWire {
    #[serde(default)]
    tests: Vec<TestIdentity>,
    #[serde(default)]
    lines: Vec<LineEntry>,
}

#[derive(Serialize, Deserialize)]
struct LineEntry {
    file: FileId,
    line: u32,
    tests: Vec<TestId>,
}

impl From<CoverageWire> for LineCoverage {
    fn from(wire: CoverageWire) -> Self {
        let mut coverage = Self::new();
        for identity in wire.tests {
            let _ = coverage.register_test(identity);
        }
        for entry in wire.lines {
            let _ = coverage.union_location(SourceLocation::new(entry.file, entry.line), entry.tests);
        }
        coverage
    }
}

impl From<LineCoverage> for CoverageWire {
    fn from(coverage: LineCoverage) -> Self {
        Self {
            tests: coverage.tests.into_values().collect(),
            lines: coverage
                .hits
                .into_iter()
                .map(|(loc, tests)| LineEntry {
                    file: loc.file,
                    line: loc.line,
                    tests: tests.into_iter().collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new(FileId::new(1), line)
    }

    #[test]
    fn test_repeated_hits_collapse() {
        let mut cov = LineCoverage::new();
        assert!(cov.insert(loc(3), TestId::new(1)));
        assert!(!cov.insert(loc(3), TestId::new(1)));
        assert!(cov.insert(loc(3), TestId::new(2)));
        assert_eq!(cov.len(), 1);
        assert_eq!(cov.membership_count(), 2);
    }

    #[test]
    fn test_absent_location_is_never_executed() {
        let mut cov = LineCoverage::new();
        let _ = cov.insert(loc(3), TestId::new(1));
        assert!(cov.is_covered(loc(3)));
        assert!(!cov.is_covered(loc(4)));
        assert!(cov.tests_at(loc(4)).is_none());
    }

    #[test]
    fn test_union_with_no_tests_creates_nothing() {
        let mut cov = LineCoverage::new();
        assert_eq!(cov.union_location(loc(9), []), 0);
        assert!(cov.is_empty());
    }

    #[test]
    fn test_union_counts_new_memberships() {
        let mut cov = LineCoverage::new();
        let _ = cov.insert(loc(1), TestId::new(1));
        let added = cov.union_location(loc(1), [TestId::new(1), TestId::new(2), TestId::new(3)]);
        assert_eq!(added, 2);
    }

    #[test]
    fn test_register_conflict_keeps_smaller_name() {
        let mut a = LineCoverage::new();
        assert_eq!(
            a.register_test(TestIdentity::new(TestId::new(1), "testB")),
            TestRegistration::Added
        );
        let outcome = a.register_test(TestIdentity::new(TestId::new(1), "testA"));
        assert_eq!(
            outcome,
            TestRegistration::Conflict {
                kept: "testA".to_string(),
                discarded: "testB".to_string()
            }
        );

        let mut b = LineCoverage::new();
        let _ = b.register_test(TestIdentity::new(TestId::new(1), "testA"));
        let _ = b.register_test(TestIdentity::new(TestId::new(1), "testB"));
        assert_eq!(a, b);
        assert_eq!(
            b.register_test(TestIdentity::new(TestId::new(1), "testA")),
            TestRegistration::Existing
        );
    }

    #[test]
    fn test_file_lines_restricted_to_file() {
        let mut cov = LineCoverage::new();
        let _ = cov.insert(SourceLocation::new(FileId::new(1), 5), TestId::new(1));
        let _ = cov.insert(SourceLocation::new(FileId::new(2), 1), TestId::new(1));
        let _ = cov.insert(SourceLocation::new(FileId::new(2), 7), TestId::new(2));
        let lines: Vec<u32> = cov.file_lines(FileId::new(2)).map(|(l, _)| l).collect();
        assert_eq!(lines, vec![1, 7]);
    }

    #[test]
    fn test_json_round_trip_preserves_membership() {
        let mut cov = LineCoverage::new();
        let _ = cov.register_test(TestIdentity::new(TestId::new(4), "testParse() void"));
        let _ = cov.insert(loc(12), TestId::new(4));
        let _ = cov.insert(loc(10), TestId::new(4));

        let json = cov.to_json().unwrap();
        assert!(json.contains("testParse() void"));
        let back = LineCoverage::from_json(&json).unwrap();
        assert_eq!(back, cov);
    }

    #[test]
    fn test_wire_entries_without_tests_are_dropped() {
        let json = r#"{"tests":[],"lines":[{"file":1,"line":3,"tests":[]}]}"#;
        let cov = LineCoverage::from_json(json).unwrap();
        assert!(cov.is_empty());
    }
}
