//! LCOV Report Formatter
//!
//! Generates LCOV-format coverage reports for CI integration.
//!
//! ## LCOV Format
//!
//! ```text
//! TN:<test name>
//! SF:<source file>
//! FN:<line>,<function name>
//! FNDA:<execution count>,<function name>
//! FNF:<functions found>
//! FNH:<functions hit>
//! DA:<line>,<execution count>
//! LF:<lines found>
//! LH:<lines hit>
//! end_of_record
//! ```
//!
//! Execution counts are the number of distinct tests, not raw hit counts.

use super::ReportFormatter;
use crate::exporter::{FileReport, ReportModel};
use crate::ids::TestId;
use crate::result::LinecovResult;
use std::collections::BTreeSet;
use std::fmt::Write;

/// LCOV format report generator
#[derive(Debug)]
pub struct LcovFormatter<'a> {
    model: &'a ReportModel,
    test_name: Option<String>,
}

impl<'a> LcovFormatter<'a> {
    /// Create a new LCOV formatter from report data
    #[must_use]
    pub const fn new(model: &'a ReportModel) -> Self {
        Self {
            model,
            test_name: None,
        }
    }

    /// Set the test name for the report
    #[must_use]
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    fn write_file(output: &mut String, file: &FileReport) {
        let _ = writeln!(output, "SF:{}", file.path);

        let mut functions_found = 0;
        let mut functions_hit = 0;
        for class in &file.page_data.classes {
            for method in &class.methods {
                // Every executable line in the range is enclosed by the method
                let lines = &file.executable_lines;
                let from = lines.partition_point(|&l| l < method.sl);
                let to = lines.partition_point(|&l| l <= method.el);
                let tests: BTreeSet<TestId> = lines[from..to]
                    .iter()
                    .flat_map(|&line| file.tests_at(line).iter().copied())
                    .collect();
                let _ = writeln!(output, "FN:{},{}", method.sl, method.name);
                let _ = writeln!(output, "FNDA:{},{}", tests.len(), method.name);
                functions_found += 1;
                if method.covered > 0 {
                    functions_hit += 1;
                }
            }
        }
        let _ = writeln!(output, "FNF:{functions_found}");
        let _ = writeln!(output, "FNH:{functions_hit}");

        let mut lines_hit = 0;
        for &line in &file.executable_lines {
            let count = file.tests_at(line).len();
            let _ = writeln!(output, "DA:{line},{count}");
            if count > 0 {
                lines_hit += 1;
            }
        }
        let _ = writeln!(output, "LF:{}", file.executable_lines.len());
        let _ = writeln!(output, "LH:{lines_hit}");

        output.push_str("end_of_record\n");
    }
}

impl ReportFormatter for LcovFormatter<'_> {
    fn generate(&self) -> LinecovResult<String> {
        let mut output = String::new();

        if let Some(ref name) = self.test_name {
            let _ = writeln!(output, "TN:{name}");
        } else {
            output.push_str("TN:\n");
        }

        for file in &self.model.files {
            Self::write_file(&mut output, file);
        }

        Ok(output)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exporter::ReportModelExporter;
    use crate::ids::{ClassId, FileId, MethodId, SourceLocation};
    use crate::line_coverage::LineCoverage;
    use crate::source_map::{ClassDescriptor, FileDescriptor, MethodDescriptor, SourceMap};
    use crate::summarizer::CoverageSummarizer;

    fn create_test_model() -> ReportModel {
        let game = FileId::new(1);
        let player = FileId::new(2);
        let map = SourceMap::build([
            FileDescriptor::new(game, "src/Game.java").with_class(
                ClassDescriptor::new(game, ClassId::new(1), "Game", 1, 30)
                    .with_method(MethodDescriptor::new(game, MethodId::new(0), "main", 10, 15))
                    .with_method(MethodDescriptor::new(game, MethodId::new(1), "update", 20, 22)),
            ),
            FileDescriptor::new(player, "src/Player.java").with_class(
                ClassDescriptor::new(player, ClassId::new(2), "Player", 1, 12)
                    .with_method(MethodDescriptor::new(player, MethodId::new(0), "move", 5, 10)),
            ),
        ])
        .unwrap();

        let mut cov = LineCoverage::new();
        let _ = cov.insert(SourceLocation::new(game, 10), TestId::new(1));
        let _ = cov.insert(SourceLocation::new(game, 10), TestId::new(2));
        let _ = cov.insert(SourceLocation::new(game, 12), TestId::new(1));
        let _ = cov.insert(SourceLocation::new(player, 5), TestId::new(3));

        let summary = CoverageSummarizer::new().summarize(&cov, &map);
        ReportModelExporter::new().export(&cov, &summary, &map)
    }

    #[test]
    fn test_generate_empty_report() {
        let model = ReportModel::default();
        let output = LcovFormatter::new(&model).generate().unwrap();
        assert_eq!(output, "TN:\n");
    }

    #[test]
    fn test_generate_with_test_name() {
        let model = create_test_model();
        let output = LcovFormatter::new(&model)
            .with_test_name("nightly")
            .generate()
            .unwrap();
        assert!(output.starts_with("TN:nightly\n"));
    }

    #[test]
    fn test_generate_contains_source_files() {
        let model = create_test_model();
        let output = LcovFormatter::new(&model).generate().unwrap();
        assert!(output.contains("SF:src/Game.java"));
        assert!(output.contains("SF:src/Player.java"));
        assert_eq!(output.matches("end_of_record").count(), 2);
    }

    #[test]
    fn test_functions_count_distinct_tests() {
        let model = create_test_model();
        let output = LcovFormatter::new(&model).generate().unwrap();
        assert!(output.contains("FN:10,main\nFNDA:2,main\n"));
        assert!(output.contains("FN:20,update\nFNDA:0,update\n"));
        assert!(output.contains("FNF:2\nFNH:1\n"));
    }

    #[test]
    fn test_line_counts_are_test_counts() {
        let model = create_test_model();
        let output = LcovFormatter::new(&model).generate().unwrap();
        assert!(output.contains("DA:10,2\n"));
        assert!(output.contains("DA:12,1\n"));
        assert!(output.contains("DA:11,0\n"));
        assert!(!output.contains("DA:16,"));
        assert!(output.contains("LF:9\nLH:2\n"));
    }

    #[test]
    fn test_hit_on_non_executable_line_does_not_mark_function_hit() {
        let file = FileId::new(1);
        let map = SourceMap::build([FileDescriptor::new(file, "src/Sparse.java")
            .with_executable_lines([10, 12])
            .with_class(
                ClassDescriptor::new(file, ClassId::new(1), "Sparse", 1, 20)
                    .with_method(MethodDescriptor::new(file, MethodId::new(0), "m", 10, 15)),
            )])
        .unwrap();
        let mut cov = LineCoverage::new();
        let _ = cov.insert(SourceLocation::new(file, 11), TestId::new(1));

        let summary = CoverageSummarizer::new().summarize(&cov, &map);
        assert_eq!(summary.covered_methods, 0);
        let model = ReportModelExporter::new().export(&cov, &summary, &map);
        let output = LcovFormatter::new(&model).generate().unwrap();

        assert!(output.contains("FN:10,m\nFNDA:0,m\n"));
        assert!(output.contains("FNF:1\nFNH:0\n"));
        assert!(output.contains("DA:10,0\nDA:12,0\nLF:2\nLH:0\n"));
    }

    #[test]
    fn test_save_creates_file() {
        let model = create_test_model();
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("coverage.lcov");

        LcovFormatter::new(&model).save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("SF:src/Game.java"));
    }
}
