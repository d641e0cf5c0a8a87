//! Result and error types for linecov.
//!
//! Only structural problems are errors. Data-quality problems found while
//! merging (unknown locations, conflicting test names) are
//! [`MergeDiagnostic`](crate::MergeDiagnostic)s and never abort a merge.

use crate::ids::FileId;
use thiserror::Error;

/// Result type for linecov operations
pub type LinecovResult<T> = Result<T, LinecovError>;

/// Errors that can occur in linecov
#[derive(Debug, Error)]
pub enum LinecovError {
    /// The source map failed validation; coverage cannot proceed
    #[error("Malformed source map for file {file}: {reason}")]
    MalformedSourceMap {
        /// File whose descriptor is invalid
        file: FileId,
        /// What was wrong with it
        reason: String,
    },

    /// Clover page data could not be parsed
    #[error("Invalid page data: {message}")]
    PageData {
        /// Error message
        message: String,
    },

    /// Configuration could not be loaded
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// A global log subscriber was already installed
    #[error("Logging setup failed: {message}")]
    Logging {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LinecovError {
    pub(crate) fn malformed(file: FileId, reason: impl Into<String>) -> Self {
        Self::MalformedSourceMap {
            file,
            reason: reason.into(),
        }
    }

    /// Whether this error came from source map validation
    #[must_use]
    pub const fn is_malformed_source_map(&self) -> bool {
        matches!(self, Self::MalformedSourceMap { .. })
    }
}
