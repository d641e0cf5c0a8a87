//! Clover JS data file formatter
//!
//! One data file per source file, loaded by the HTML report next to the
//! rendered source:
//!
//! ```text
//! var clover = new Object();
//!
//! // JSON: {classes : [{name, id, sl, el,  methods : [{sl, el}, ...]}, ...]}
//! clover.pageData = {...};
//!
//! // JSON: {test_ID : {"methods": [ID1, ID2, ID3...], "name" : "testXXX() void"}, ...};
//! clover.testTargets = {...};
//!
//! // JSON: { lines : [{tests : [testid1, testid2, testid3, ...]}, ...]};
//! clover.srcFileLines = [[...], ...];
//! ```

use super::ReportFormatter;
use crate::exporter::{FileReport, ReportModel};
use crate::result::LinecovResult;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Clover JS data file generator for one file
#[derive(Debug)]
pub struct CloverJsFormatter<'a> {
    file: &'a FileReport,
}

impl<'a> CloverJsFormatter<'a> {
    /// Create a formatter for one file of the report
    #[must_use]
    pub const fn new(file: &'a FileReport) -> Self {
        Self { file }
    }

    /// Data file path for a source path: `com/x/Foo.java` -> `com/x/Foo.js`
    #[must_use]
    pub fn data_file_path(source_path: &str) -> PathBuf {
        Path::new(source_path).with_extension("js")
    }

    /// Write one data file per source file under `dir`
    ///
    /// # Errors
    ///
    /// Returns error if any file cannot be serialized or written
    pub fn save_all(model: &ReportModel, dir: &Path) -> LinecovResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(model.files.len());
        for file in &model.files {
            let path = dir.join(Self::data_file_path(&file.path));
            CloverJsFormatter::new(file).save(&path)?;
            written.push(path);
        }
        tracing::info!(files = written.len(), dir = %dir.display(), "clover data files written");
        Ok(written)
    }
}

impl ReportFormatter for CloverJsFormatter<'_> {
    fn generate(&self) -> LinecovResult<String> {
        let mut output = String::from("var clover = new Object();\n\n");

        let _ = writeln!(
            output,
            "// JSON: {{classes : [{{name, id, sl, el,  methods : [{{sl, el}}, ...]}}, ...]}}"
        );
        let _ = writeln!(
            output,
            "clover.pageData = {};\n",
            serde_json::to_string(&self.file.page_data)?
        );

        let _ = writeln!(
            output,
            "// JSON: {{test_ID : {{\"methods\": [ID1, ID2, ID3...], \"name\" : \"testXXX() void\"}}, ...}};"
        );
        let _ = writeln!(
            output,
            "clover.testTargets = {};\n",
            serde_json::to_string(&self.file.test_targets)?
        );

        let _ = writeln!(
            output,
            "// JSON: {{ lines : [{{tests : [testid1, testid2, testid3, ...]}}, ...]}};"
        );
        let _ = writeln!(
            output,
            "clover.srcFileLines = {};",
            serde_json::to_string(&self.file.src_file_lines)?
        );

        Ok(output)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exporter::{ClassRecord, MethodRecord, PageDataRecord, TestTarget};
    use crate::ids::{ClassId, FileId, MethodId, TestId};
    use std::collections::BTreeMap;

    fn file_report() -> FileReport {
        let mut targets = BTreeMap::new();
        let _ = targets.insert(
            TestId::new(4),
            TestTarget {
                name: "testRun() void".to_string(),
                methods: vec![MethodId::new(0)],
            },
        );
        FileReport {
            file: FileId::new(1),
            path: "com/example/Outer.java".to_string(),
            page_data: PageDataRecord {
                classes: vec![ClassRecord {
                    id: ClassId::new(228403),
                    name: "Outer".to_string(),
                    sl: 1,
                    el: 4,
                    methods: vec![MethodRecord {
                        id: MethodId::new(0),
                        name: "run".to_string(),
                        sl: 2,
                        el: 3,
                        sc: 2,
                        covered: 1,
                        total: 2,
                    }],
                    covered: 1,
                    total: 2,
                    percent: Some(50.0),
                }],
            },
            test_targets: targets,
            src_file_lines: vec![vec![], vec![TestId::new(4)], vec![], vec![]],
            executable_lines: vec![2, 3],
        }
    }

    #[test]
    fn test_generate_has_three_assignments() {
        let report = file_report();
        let output = CloverJsFormatter::new(&report).generate().unwrap();
        assert!(output.starts_with("var clover = new Object();"));
        assert!(output.contains("clover.pageData = {\"classes\":[{\"id\":228403"));
        assert!(output.contains("clover.testTargets = {\"4\":{\"name\":\"testRun() void\",\"methods\":[0]}};"));
        assert!(output.contains("clover.srcFileLines = [[],[4],[],[]];"));
    }

    #[test]
    fn test_generate_keeps_comment_headers() {
        let report = file_report();
        let output = CloverJsFormatter::new(&report).generate().unwrap();
        assert!(output.contains("// JSON: {classes : [{name, id, sl, el,  methods : [{sl, el}, ...]}, ...]}"));
        assert!(output.contains("// JSON: { lines : [{tests : [testid1, testid2, testid3, ...]}, ...]};"));
    }

    #[test]
    fn test_data_file_path_swaps_extension() {
        assert_eq!(
            CloverJsFormatter::data_file_path("com/rapidminer/Process.java"),
            PathBuf::from("com/rapidminer/Process.js")
        );
    }

    #[test]
    fn test_save_all_writes_nested_paths() {
        let model = ReportModel {
            files: vec![file_report()],
        };
        let dir = tempfile::tempdir().unwrap();
        let written = CloverJsFormatter::save_all(&model, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("com/example/Outer.js")]);
        let content = std::fs::read_to_string(&written[0]).unwrap();
        assert!(content.contains("clover.srcFileLines"));
    }
}
