//! Report Model Exporter
//!
//! Pure transformation of the canonical coverage and its summary into the
//! structure a report renderer consumes. Per file it mirrors the Clover data
//! files: `pageData` (classes and methods with their ranges), `testTargets`
//! (test id -> name and methods touched) and `srcFileLines` (for every line,
//! the tests that executed it). No state is kept and nothing is aggregated
//! here beyond regrouping.

use crate::config::{Attribution, CoverageConfig};
use crate::ids::{ClassId, FileId, MethodId, TestId};
use crate::line_coverage::LineCoverage;
use crate::source_map::{LineResolution, SourceMap};
use crate::summarizer::{CoverageSummary, FileCoverage, MethodCoverage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Method entry of `pageData`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRecord {
    /// Method id
    pub id: MethodId,
    /// Method name
    pub name: String,
    /// Start line
    pub sl: u32,
    /// End line
    pub el: u32,
    /// Start column
    pub sc: u32,
    /// Covered lines
    pub covered: usize,
    /// Executable lines
    pub total: usize,
}

/// Class entry of `pageData`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    /// Class id
    pub id: ClassId,
    /// Class name
    pub name: String,
    /// Start line
    pub sl: u32,
    /// End line
    pub el: u32,
    /// Methods in declaration order
    pub methods: Vec<MethodRecord>,
    /// Covered lines
    pub covered: usize,
    /// Executable lines
    pub total: usize,
    /// Coverage percentage, absent when not applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

/// `pageData` of one file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageDataRecord {
    /// Classes in declaration order
    pub classes: Vec<ClassRecord>,
}

/// Methods one test touched in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTarget {
    /// Test display name
    pub name: String,
    /// Methods touched, ascending
    pub methods: Vec<MethodId>,
}

/// Report data for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    /// File id
    pub file: FileId,
    /// File path
    pub path: String,
    /// Class and method layout with rollups
    #[serde(rename = "pageData")]
    pub page_data: PageDataRecord,
    /// Test id -> methods touched in this file
    #[serde(rename = "testTargets")]
    pub test_targets: BTreeMap<TestId, TestTarget>,
    /// Entry `i` lists the tests that executed line `i + 1`
    #[serde(rename = "srcFileLines")]
    pub src_file_lines: Vec<Vec<TestId>>,
    /// Lines counted in denominators, ascending
    #[serde(rename = "executableLines")]
    pub executable_lines: Vec<u32>,
}

impl FileReport {
    /// Tests that executed a 1-based line
    #[must_use]
    pub fn tests_at(&self, line: u32) -> &[TestId] {
        if line == 0 {
            return &[];
        }
        self.src_file_lines
            .get(line as usize - 1)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Report data for a whole session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    /// Files in source map order
    pub files: Vec<FileReport>,
}

impl ReportModel {
    /// Report of one file
    #[must_use]
    pub fn file(&self, file: FileId) -> Option<&FileReport> {
        self.files.iter().find(|f| f.file == file)
    }
}

/// Builds a [`ReportModel`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportModelExporter {
    attribution: Attribution,
}

impl ReportModelExporter {
    /// Create an exporter attributing lines to the innermost method
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an exporter with explicit attribution
    #[must_use]
    pub const fn with_attribution(attribution: Attribution) -> Self {
        Self { attribution }
    }

    /// Create an exporter from configuration
    #[must_use]
    pub const fn from_config(config: &CoverageConfig) -> Self {
        Self::with_attribution(config.attribution)
    }

    /// Transform coverage and summary into the report model
    #[must_use]
    pub fn export(
        &self,
        coverage: &LineCoverage,
        summary: &CoverageSummary,
        source_map: &SourceMap,
    ) -> ReportModel {
        let files = source_map
            .files()
            .filter_map(|file| {
                let rollup = summary.file(file.id)?;
                Some(self.export_file(coverage, rollup, source_map))
            })
            .collect();
        ReportModel { files }
    }

    fn export_file(
        &self,
        coverage: &LineCoverage,
        rollup: &FileCoverage,
        source_map: &SourceMap,
    ) -> FileReport {
        let file = rollup.file;
        let line_count = source_map.line_count(file).unwrap_or(0);

        let mut src_file_lines = vec![Vec::new(); line_count as usize];
        let mut targets: BTreeMap<TestId, BTreeSet<MethodId>> = BTreeMap::new();
        for (line, tests) in coverage.file_lines(file) {
            if line == 0 || line > line_count {
                continue;
            }
            src_file_lines[line as usize - 1] = tests.iter().copied().collect();

            let touched: &[MethodId] = match source_map.resolve(file, line) {
                LineResolution::Mapped {
                    method, enclosing, ..
                } => match self.attribution {
                    Attribution::Innermost => enclosing
                        .iter()
                        .position(|&m| m == method)
                        .map(|i| &enclosing[i..=i])
                        .unwrap_or(&[]),
                    Attribution::AllEnclosing => enclosing,
                },
                LineResolution::Unmapped => &[],
            };
            for &test in tests {
                targets.entry(test).or_default().extend(touched.iter().copied());
            }
        }

        let test_targets = targets
            .into_iter()
            .map(|(test, methods)| {
                let name = coverage
                    .test(test)
                    .map_or_else(|| format!("test {test}"), |t| t.name.clone());
                (
                    test,
                    TestTarget {
                        name,
                        methods: methods.into_iter().collect(),
                    },
                )
            })
            .collect();

        let methods: HashMap<MethodId, &MethodCoverage> =
            rollup.methods.iter().map(|m| (m.method, m)).collect();
        let classes = rollup
            .classes
            .iter()
            .map(|class| {
                let declared = source_map.class(file, class.class);
                let method_records = declared
                    .map(|c| c.methods.as_slice())
                    .unwrap_or(&[])
                    .iter()
                    .map(|m| {
                        let stats = methods.get(&m.id);
                        MethodRecord {
                            id: m.id,
                            name: m.name.clone(),
                            sl: m.start_line,
                            el: m.end_line,
                            sc: m.start_column,
                            covered: stats.map_or(0, |s| s.covered_lines),
                            total: stats.map_or(0, |s| s.total_lines),
                        }
                    })
                    .collect();
                ClassRecord {
                    id: class.class,
                    name: class.name.clone(),
                    sl: class.start_line,
                    el: class.end_line,
                    methods: method_records,
                    covered: class.covered_lines,
                    total: class.total_lines,
                    percent: class.percent,
                }
            })
            .collect();

        let executable_lines = (1..=line_count)
            .filter(|&line| source_map.resolve(file, line).is_mapped())
            .collect();

        FileReport {
            file,
            path: rollup.path.clone(),
            page_data: PageDataRecord { classes },
            test_targets,
            src_file_lines,
            executable_lines,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ids::{SourceLocation, TestIdentity};
    use crate::source_map::{ClassDescriptor, FileDescriptor, MethodDescriptor};
    use crate::summarizer::CoverageSummarizer;

    const F: FileId = FileId::new(1);

    fn source_map() -> SourceMap {
        let file = FileDescriptor::new(F, "com/example/Outer.java")
            .with_line_count(30)
            .with_class(
                ClassDescriptor::new(F, ClassId::new(500), "Outer", 1, 28)
                    .with_method(
                        MethodDescriptor::new(F, MethodId::new(0), "run", 5, 20)
                            .with_start_column(2),
                    )
                    .with_method(MethodDescriptor::new(F, MethodId::new(1), "lambda", 8, 10)),
            );
        SourceMap::build([file]).unwrap()
    }

    fn coverage() -> LineCoverage {
        let mut cov = LineCoverage::new();
        let _ = cov.register_test(TestIdentity::new(TestId::new(7), "testRun() void"));
        let _ = cov.insert(SourceLocation::new(F, 6), TestId::new(7));
        let _ = cov.insert(SourceLocation::new(F, 9), TestId::new(7));
        let _ = cov.insert(SourceLocation::new(F, 9), TestId::new(8));
        cov
    }

    fn export(attribution: Attribution) -> ReportModel {
        let map = source_map();
        let cov = coverage();
        let summary = CoverageSummarizer::new().summarize(&cov, &map);
        ReportModelExporter::with_attribution(attribution).export(&cov, &summary, &map)
    }

    #[test]
    fn test_src_file_lines_cover_every_line() {
        let model = export(Attribution::Innermost);
        let file = model.file(F).unwrap();
        assert_eq!(file.src_file_lines.len(), 30);
        assert_eq!(file.tests_at(9), &[TestId::new(7), TestId::new(8)]);
        assert_eq!(file.tests_at(6), &[TestId::new(7)]);
        assert!(file.tests_at(7).is_empty());
        assert!(file.tests_at(0).is_empty());
        assert!(file.tests_at(31).is_empty());
    }

    #[test]
    fn test_targets_innermost_attribution() {
        let model = export(Attribution::Innermost);
        let targets = &model.file(F).unwrap().test_targets;
        let t7 = targets.get(&TestId::new(7)).unwrap();
        assert_eq!(t7.name, "testRun() void");
        assert_eq!(t7.methods, vec![MethodId::new(0), MethodId::new(1)]);
        let t8 = targets.get(&TestId::new(8)).unwrap();
        assert_eq!(t8.name, "test 8");
        assert_eq!(t8.methods, vec![MethodId::new(1)]);
    }

    #[test]
    fn test_targets_all_enclosing_attribution() {
        let model = export(Attribution::AllEnclosing);
        let t8 = model.file(F).unwrap().test_targets.get(&TestId::new(8)).unwrap();
        assert_eq!(t8.methods, vec![MethodId::new(0), MethodId::new(1)]);
    }

    #[test]
    fn test_page_data_mirrors_layout_and_rollups() {
        let model = export(Attribution::Innermost);
        let class = &model.file(F).unwrap().page_data.classes[0];
        assert_eq!(class.id, ClassId::new(500));
        assert_eq!((class.sl, class.el), (1, 28));
        assert_eq!((class.covered, class.total), (2, 16));
        assert_eq!(class.methods.len(), 2);
        assert_eq!(class.methods[0].sc, 2);
        assert_eq!((class.methods[1].covered, class.methods[1].total), (1, 3));
    }

    #[test]
    fn test_executable_lines_listed() {
        let model = export(Attribution::Innermost);
        let file = model.file(F).unwrap();
        assert_eq!(file.executable_lines.first(), Some(&5));
        assert_eq!(file.executable_lines.last(), Some(&20));
        assert_eq!(file.executable_lines.len(), 16);
    }

    #[test]
    fn test_serialized_field_names() {
        let model = export(Attribution::Innermost);
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"pageData\""));
        assert!(json.contains("\"testTargets\""));
        assert!(json.contains("\"srcFileLines\""));
        assert!(json.contains("\"7\":{\"name\":\"testRun() void\""));
        let back: ReportModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }
}
