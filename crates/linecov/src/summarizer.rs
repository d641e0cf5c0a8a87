//! Coverage Summarizer: method, class and file rollups
//!
//! - Method total: executable lines in the method's range that the method
//!   encloses. Nested methods share lines, so a hit on a shared line counts
//!   for each of them.
//! - Class total: the union (not the sum) of its methods' line sets, so a
//!   shared line is counted once.
//! - File total: the union of its classes' line sets.
//!
//! A zero total has no meaningful percentage. It is reported as `None`
//! unless [`EmptyTotalPolicy::FullCoverage`] is configured.

use crate::config::{CoverageConfig, EmptyTotalPolicy};
use crate::ids::{ClassId, FileId, MethodId, SourceLocation};
use crate::line_coverage::LineCoverage;
use crate::source_map::SourceMap;
use serde::Serialize;
use std::collections::BTreeSet;

/// Rollup for one method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodCoverage {
    /// File containing the method
    pub file: FileId,
    /// Method id
    pub method: MethodId,
    /// Declaring class
    pub class: ClassId,
    /// Method name
    pub name: String,
    /// First line
    pub start_line: u32,
    /// Last line
    pub end_line: u32,
    /// Executable lines hit by at least one test
    pub covered_lines: usize,
    /// Executable lines accrued by the method
    pub total_lines: usize,
    /// `covered / total * 100`, `None` when not applicable
    pub percent: Option<f64>,
}

impl MethodCoverage {
    /// A method is covered iff any of its lines was hit
    #[must_use]
    pub const fn is_covered(&self) -> bool {
        self.covered_lines > 0
    }
}

/// Rollup for one class
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCoverage {
    /// File containing the class
    pub file: FileId,
    /// Class id
    pub class: ClassId,
    /// Class name
    pub name: String,
    /// First line
    pub start_line: u32,
    /// Last line
    pub end_line: u32,
    /// Covered lines in the union of method line sets
    pub covered_lines: usize,
    /// Size of the union of method line sets
    pub total_lines: usize,
    /// Methods with at least one covered line
    pub covered_methods: usize,
    /// Methods declared by the class
    pub total_methods: usize,
    /// `covered / total * 100`, `None` when not applicable
    pub percent: Option<f64>,
}

impl ClassCoverage {
    /// A class is covered iff any of its lines was hit
    #[must_use]
    pub const fn is_covered(&self) -> bool {
        self.covered_lines > 0
    }
}

/// Rollup for one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileCoverage {
    /// File id
    pub file: FileId,
    /// File path
    pub path: String,
    /// Classes in declaration order
    pub classes: Vec<ClassCoverage>,
    /// Methods in declaration order
    pub methods: Vec<MethodCoverage>,
    /// Covered lines in the file's line set
    pub covered_lines: usize,
    /// Executable lines owned by any method
    pub total_lines: usize,
    /// Covered methods
    pub covered_methods: usize,
    /// All methods
    pub total_methods: usize,
    /// `covered / total * 100`, `None` when not applicable
    pub percent: Option<f64>,
}

/// Rollup for a whole session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageSummary {
    /// Files in source map order
    pub files: Vec<FileCoverage>,
    /// Covered lines across files
    pub covered_lines: usize,
    /// Executable lines across files
    pub total_lines: usize,
    /// Covered methods across files
    pub covered_methods: usize,
    /// Methods across files
    pub total_methods: usize,
    /// Covered classes across files
    pub covered_classes: usize,
    /// Classes across files
    pub total_classes: usize,
    /// `covered / total * 100`, `None` when not applicable
    pub percent: Option<f64>,
}

impl CoverageSummary {
    /// Rollup of one file
    #[must_use]
    pub fn file(&self, file: FileId) -> Option<&FileCoverage> {
        self.files.iter().find(|f| f.file == file)
    }

    /// Rollup of one method
    #[must_use]
    pub fn method(&self, file: FileId, method: MethodId) -> Option<&MethodCoverage> {
        self.file(file)?.methods.iter().find(|m| m.method == method)
    }

    /// Rollup of one class
    #[must_use]
    pub fn class(&self, file: FileId, class: ClassId) -> Option<&ClassCoverage> {
        self.file(file)?.classes.iter().find(|c| c.class == class)
    }
}

/// Computes rollups from line coverage and the source map
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverageSummarizer {
    policy: EmptyTotalPolicy,
}

impl CoverageSummarizer {
    /// Create a summarizer reporting zero totals as not applicable
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a summarizer with an explicit empty-total policy
    #[must_use]
    pub const fn with_policy(policy: EmptyTotalPolicy) -> Self {
        Self { policy }
    }

    /// Create a summarizer from configuration
    #[must_use]
    pub const fn from_config(config: &CoverageConfig) -> Self {
        Self::with_policy(config.empty_total_policy)
    }

    /// Percentage of `covered` in `total` under this summarizer's policy
    #[must_use]
    pub fn percent(&self, covered: usize, total: usize) -> Option<f64> {
        if total == 0 {
            return match self.policy {
                EmptyTotalPolicy::NotApplicable => None,
                EmptyTotalPolicy::FullCoverage => Some(100.0),
            };
        }
        Some(covered as f64 / total as f64 * 100.0)
    }

    /// Roll line coverage up to methods, classes and files
    #[must_use]
    pub fn summarize(&self, coverage: &LineCoverage, source_map: &SourceMap) -> CoverageSummary {
        let files: Vec<FileCoverage> = source_map
            .files()
            .map(|file| self.summarize_file(coverage, source_map, file.id, &file.path))
            .collect();

        let covered_lines = files.iter().map(|f| f.covered_lines).sum();
        let total_lines = files.iter().map(|f| f.total_lines).sum();
        let summary = CoverageSummary {
            covered_lines,
            total_lines,
            covered_methods: files.iter().map(|f| f.covered_methods).sum(),
            total_methods: files.iter().map(|f| f.total_methods).sum(),
            covered_classes: files
                .iter()
                .flat_map(|f| &f.classes)
                .filter(|c| c.is_covered())
                .count(),
            total_classes: files.iter().map(|f| f.classes.len()).sum(),
            percent: self.percent(covered_lines, total_lines),
            files,
        };
        tracing::debug!(
            covered = summary.covered_lines,
            total = summary.total_lines,
            "coverage summarized"
        );
        summary
    }

    fn summarize_file(
        &self,
        coverage: &LineCoverage,
        source_map: &SourceMap,
        file: FileId,
        path: &str,
    ) -> FileCoverage {
        let hit = |line: u32| coverage.is_covered(SourceLocation::new(file, line));
        let mut classes = Vec::new();
        let mut methods = Vec::new();
        let mut file_lines = BTreeSet::new();

        for class in source_map
            .file(file)
            .map(|f| f.classes.as_slice())
            .unwrap_or(&[])
        {
            let mut class_lines = BTreeSet::new();
            let mut covered_methods = 0;

            for method in &class.methods {
                let lines = source_map.method_lines(file, method.id);
                let covered = lines.iter().filter(|&&line| hit(line)).count();
                if covered > 0 {
                    covered_methods += 1;
                }
                methods.push(MethodCoverage {
                    file,
                    method: method.id,
                    class: class.id,
                    name: method.name.clone(),
                    start_line: method.start_line,
                    end_line: method.end_line,
                    covered_lines: covered,
                    total_lines: lines.len(),
                    percent: self.percent(covered, lines.len()),
                });
                class_lines.extend(lines);
            }

            let covered = class_lines.iter().filter(|&&line| hit(line)).count();
            classes.push(ClassCoverage {
                file,
                class: class.id,
                name: class.name.clone(),
                start_line: class.start_line,
                end_line: class.end_line,
                covered_lines: covered,
                total_lines: class_lines.len(),
                covered_methods,
                total_methods: class.methods.len(),
                percent: self.percent(covered, class_lines.len()),
            });
            file_lines.extend(class_lines);
        }

        let covered_lines = file_lines.iter().filter(|&&line| hit(line)).count();
        let covered_methods = methods.iter().filter(|m| m.is_covered()).count();
        FileCoverage {
            file,
            path: path.to_string(),
            covered_lines,
            total_lines: file_lines.len(),
            covered_methods,
            total_methods: methods.len(),
            percent: self.percent(covered_lines, file_lines.len()),
            classes,
            methods,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ids::TestId;
    use crate::source_map::{ClassDescriptor, FileDescriptor, MethodDescriptor};

    const F: FileId = FileId::new(1);
    const T1: TestId = TestId::new(1);

    fn method(id: u32, start: u32, end: u32) -> MethodDescriptor {
        MethodDescriptor::new(F, MethodId::new(id), format!("m{id}"), start, end)
    }

    fn hits(lines: &[u32]) -> LineCoverage {
        let mut cov = LineCoverage::new();
        for &line in lines {
            let _ = cov.insert(SourceLocation::new(F, line), T1);
        }
        cov
    }

    #[test]
    fn test_method_ten_to_fifteen_with_two_hits() {
        let file = FileDescriptor::new(F, "A.java").with_class(
            ClassDescriptor::new(F, ClassId::new(1), "A", 1, 20).with_method(method(0, 10, 15)),
        );
        let map = SourceMap::build([file]).unwrap();
        let summary = CoverageSummarizer::new().summarize(&hits(&[10, 12]), &map);

        let m = summary.method(F, MethodId::new(0)).unwrap();
        assert_eq!(m.total_lines, 6);
        assert_eq!(m.covered_lines, 2);
        assert_eq!(m.percent, Some(2.0 / 6.0 * 100.0));
        assert!(m.is_covered());
    }

    #[test]
    fn test_unmapped_lines_leave_denominator() {
        let file = FileDescriptor::new(F, "A.java")
            .with_class(
                ClassDescriptor::new(F, ClassId::new(1), "A", 1, 20)
                    .with_method(method(0, 10, 15)),
            )
            .with_executable_lines([10, 12, 13, 15]);
        let map = SourceMap::build([file]).unwrap();
        let summary = CoverageSummarizer::new().summarize(&hits(&[10, 11, 12]), &map);

        let m = summary.method(F, MethodId::new(0)).unwrap();
        assert_eq!(m.total_lines, 4);
        assert_eq!(m.covered_lines, 2);
        assert_eq!(m.percent, Some(50.0));
    }

    #[test]
    fn test_nested_methods_share_line_class_counts_once() {
        let file = FileDescriptor::new(F, "Outer.java").with_class(
            ClassDescriptor::new(F, ClassId::new(1), "Outer", 1, 40)
                .with_method(method(0, 18, 25))
                .with_method(method(1, 19, 21)),
        );
        let map = SourceMap::build([file]).unwrap();
        let summary = CoverageSummarizer::new().summarize(&hits(&[20]), &map);

        let outer = summary.method(F, MethodId::new(0)).unwrap();
        let inner = summary.method(F, MethodId::new(1)).unwrap();
        assert_eq!((outer.covered_lines, outer.total_lines), (1, 8));
        assert_eq!((inner.covered_lines, inner.total_lines), (1, 3));

        let class = summary.class(F, ClassId::new(1)).unwrap();
        assert_eq!(class.total_lines, 8);
        assert_eq!(class.covered_lines, 1);
        assert_eq!(class.covered_methods, 2);
        assert_eq!(summary.file(F).unwrap().total_lines, 8);
    }

    #[test]
    fn test_empty_total_is_not_applicable_by_default() {
        let file = FileDescriptor::new(F, "Marker.java")
            .with_class(ClassDescriptor::new(F, ClassId::new(1), "Marker", 1, 5));
        let map = SourceMap::build([file]).unwrap();
        let summary = CoverageSummarizer::new().summarize(&LineCoverage::new(), &map);

        let class = summary.class(F, ClassId::new(1)).unwrap();
        assert_eq!(class.total_lines, 0);
        assert_eq!(class.percent, None);
        assert_eq!(summary.percent, None);
        assert!(!class.is_covered());
    }

    #[test]
    fn test_empty_total_full_coverage_when_configured() {
        let file = FileDescriptor::new(F, "Marker.java")
            .with_class(ClassDescriptor::new(F, ClassId::new(1), "Marker", 1, 5));
        let map = SourceMap::build([file]).unwrap();
        let summary = CoverageSummarizer::with_policy(EmptyTotalPolicy::FullCoverage)
            .summarize(&LineCoverage::new(), &map);
        assert_eq!(summary.class(F, ClassId::new(1)).unwrap().percent, Some(100.0));
        assert_eq!(summary.percent, Some(100.0));
    }

    #[test]
    fn test_hits_outside_methods_are_ignored() {
        let file = FileDescriptor::new(F, "A.java").with_class(
            ClassDescriptor::new(F, ClassId::new(1), "A", 1, 20).with_method(method(0, 10, 11)),
        );
        let map = SourceMap::build([file]).unwrap();
        let summary = CoverageSummarizer::new().summarize(&hits(&[2, 3]), &map);
        assert_eq!(summary.covered_lines, 0);
        assert_eq!(summary.total_lines, 2);
        assert_eq!(summary.percent, Some(0.0));
    }

    #[test]
    fn test_session_totals_across_files() {
        let g = FileId::new(2);
        let a = FileDescriptor::new(F, "A.java").with_class(
            ClassDescriptor::new(F, ClassId::new(1), "A", 1, 20).with_method(method(0, 2, 5)),
        );
        let b = FileDescriptor::new(g, "B.java").with_class(
            ClassDescriptor::new(g, ClassId::new(1), "B", 1, 20)
                .with_method(MethodDescriptor::new(g, MethodId::new(0), "b", 2, 3)),
        );
        let map = SourceMap::build([a, b]).unwrap();
        let summary = CoverageSummarizer::new().summarize(&hits(&[2]), &map);
        assert_eq!(summary.total_lines, 6);
        assert_eq!(summary.covered_lines, 1);
        assert_eq!(summary.total_methods, 2);
        assert_eq!(summary.covered_methods, 1);
        assert_eq!(summary.total_classes, 2);
        assert_eq!(summary.covered_classes, 1);
    }
}
