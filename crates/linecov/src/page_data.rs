//! Clover Page Data Loader
//!
//! Builds [`FileDescriptor`]s from the per-file structure Clover writes into
//! its HTML report data files:
//!
//! ```text
//! clover.pageData = {"classes":[{"el":136,"id":182061,"methods":[{"el":116,"sc":3,"sl":114}],
//!                    "name":"AbstractChartPanel.SelectionListener","sl":127}]}
//! clover.srcFileLines = [[], [], ...]
//! ```
//!
//! Page data carries no method ids or names, so methods are numbered per file
//! in declaration order and named after their class and start line.

use crate::ids::{ClassId, FileId, MethodId};
use crate::result::{LinecovError, LinecovResult};
use crate::source_map::{ClassDescriptor, FileDescriptor, MethodDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const PAGE_DATA_PREFIX: &str = "clover.pageData";
const SRC_FILE_LINES_PREFIX: &str = "clover.srcFileLines";

/// Method entry of page data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMethod {
    /// Start line
    pub sl: u32,
    /// End line
    pub el: u32,
    /// Start column
    #[serde(default)]
    pub sc: u32,
    /// Optional name (not present in Clover output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Class entry of page data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageClass {
    /// Class id
    pub id: u32,
    /// Qualified class name
    pub name: String,
    /// Start line
    pub sl: u32,
    /// End line
    pub el: u32,
    /// Methods in declaration order
    #[serde(default)]
    pub methods: Vec<PageMethod>,
}

/// The `pageData` object of one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    /// Classes in declaration order
    #[serde(default)]
    pub classes: Vec<PageClass>,
}

impl PageData {
    /// Parse the bare JSON object
    ///
    /// # Errors
    ///
    /// Returns error if the JSON does not match the page data shape
    pub fn from_json(json: &str) -> LinecovResult<Self> {
        serde_json::from_str(json).map_err(|e| LinecovError::PageData {
            message: e.to_string(),
        })
    }

    /// Convert into a file descriptor
    ///
    /// Class ids repeated within the page (Clover reuses the outer id for
    /// some inner types) are moved to fresh ids above the page's maximum.
    #[must_use]
    pub fn into_file_descriptor(self, file: FileId, path: impl Into<String>) -> FileDescriptor {
        let path = path.into();
        let mut next_class_id = self
            .classes
            .iter()
            .map(|c| c.id)
            .max()
            .map_or(0, |max| max.saturating_add(1));
        let mut seen = HashSet::new();
        let mut next_method_id = 0u32;
        let mut descriptor = FileDescriptor::new(file, path.as_str());

        for class in self.classes {
            let mut class_id = class.id;
            if !seen.insert(class_id) {
                tracing::warn!(
                    file = %path,
                    class = %class.name,
                    duplicate = class_id,
                    reassigned = next_class_id,
                    "duplicate class id in page data"
                );
                class_id = next_class_id;
                next_class_id = next_class_id.saturating_add(1);
                let _ = seen.insert(class_id);
            }

            let mut class_descriptor = ClassDescriptor::new(
                file,
                ClassId::new(class_id),
                class.name.as_str(),
                class.sl,
                class.el,
            );
            for method in class.methods {
                let name = method
                    .name
                    .unwrap_or_else(|| format!("{}@{}", class.name, method.sl));
                class_descriptor.methods.push(
                    MethodDescriptor::new(
                        file,
                        MethodId::new(next_method_id),
                        name,
                        method.sl,
                        method.el,
                    )
                    .with_start_column(method.sc),
                );
                next_method_id += 1;
            }
            descriptor.classes.push(class_descriptor);
        }

        descriptor
    }
}

/// Page data plus the line count recovered from a Clover JS data file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloverPage {
    /// Class and method layout
    pub page_data: PageData,
    /// Length of `srcFileLines`, when present
    pub line_count: Option<u32>,
}

impl CloverPage {
    /// Parse a Clover JS data file (`var clover = new Object(); ...`)
    ///
    /// # Errors
    ///
    /// Returns error if the `clover.pageData` assignment is missing or any
    /// assignment does not hold valid JSON
    pub fn from_js(js: &str) -> LinecovResult<Self> {
        let page_json = assignment(js, PAGE_DATA_PREFIX).ok_or_else(|| LinecovError::PageData {
            message: format!("no {PAGE_DATA_PREFIX} assignment found"),
        })?;
        let page_data = PageData::from_json(page_json)?;

        let line_count = match assignment(js, SRC_FILE_LINES_PREFIX) {
            Some(lines_json) => {
                let lines: Vec<serde_json::Value> = serde_json::from_str(lines_json)?;
                Some(lines.len() as u32)
            }
            None => None,
        };

        Ok(Self {
            page_data,
            line_count,
        })
    }

    /// Convert into a file descriptor, carrying the line count over
    #[must_use]
    pub fn into_file_descriptor(self, file: FileId, path: impl Into<String>) -> FileDescriptor {
        let mut descriptor = self.page_data.into_file_descriptor(file, path);
        if let Some(lines) = self.line_count {
            let declared_end = descriptor
                .classes
                .iter()
                .map(|c| c.end_line)
                .max()
                .unwrap_or(0);
            descriptor.line_count = Some(lines.max(declared_end));
        }
        descriptor
    }
}

/// Right-hand side of `<prefix> = <json>` on a single line, without `;`
fn assignment<'a>(js: &'a str, prefix: &str) -> Option<&'a str> {
    js.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix(prefix)?;
        let rest = rest.trim_start().strip_prefix('=')?;
        Some(rest.trim().trim_end_matches(';').trim_end())
    })
}
