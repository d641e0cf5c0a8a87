//! Report Formatters
//!
//! Serializers of the [`ReportModel`](crate::ReportModel): Clover JS data
//! files for the HTML report, plain JSON, and LCOV for CI integration.

mod clover_js;
mod json;
mod lcov;

pub use clover_js::CloverJsFormatter;
pub use json::JsonFormatter;
pub use lcov::LcovFormatter;

use crate::result::LinecovResult;
use std::path::Path;

/// A serializer of report data
pub trait ReportFormatter {
    /// Render the report as a string
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    fn generate(&self) -> LinecovResult<String>;

    /// Render the report and write it to `path`
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the file write fails
    fn save(&self, path: &Path) -> LinecovResult<()> {
        let content = self.generate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "report written");
        Ok(())
    }
}
