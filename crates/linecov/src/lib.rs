//! Linecov: Per-Test Line Coverage Recording and Aggregation
//!
//! Records which tests executed which source lines, folds partial results
//! from many execution contexts into one canonical model, rolls line
//! coverage up to methods, classes and files, and exports the data a Clover
//! style HTML report needs (`pageData`, `testTargets`, `srcFileLines`).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  LINECOV ARCHITECTURE                                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  SourceMap (Arc, immutable, shared by every context)            │
//! │      │                                                          │
//! │      ▼                                                          │
//! │  HitRecorder ×N ──drain──► RunAggregator (set union, RwLock)    │
//! │                                 │ snapshot                      │
//! │                                 ▼                               │
//! │  CoverageSummarizer ──► ReportModelExporter ──► Formatters      │
//! │  (method/class/file)    (pageData, testTargets,  (Clover JS,    │
//! │                          srcFileLines)            JSON, LCOV)   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Toyota Way Principles Applied
//!
//! - **Poka-Yoke**: Type-safe `FileId`, `ClassId`, `MethodId`, `TestId`
//! - **Muda**: Per-context recorders keep the hot path free of contention
//! - **Jidoka**: Malformed source maps stop; bad hits are logged and skipped
//!
//! # Example
//!
//! ```
//! use linecov::{
//!     ClassDescriptor, CoverageConfig, CoverageSession, FileDescriptor, FileId,
//!     MethodDescriptor, MethodId, ClassId, SourceLocation, SourceMap, TestId, TestIdentity,
//! };
//! use std::sync::Arc;
//!
//! let file = FileId::new(1);
//! let map = SourceMap::build([FileDescriptor::new(file, "Calc.java").with_class(
//!     ClassDescriptor::new(file, ClassId::new(1), "Calc", 1, 20)
//!         .with_method(MethodDescriptor::new(file, MethodId::new(0), "add", 10, 15)),
//! )])?;
//!
//! let session = CoverageSession::new("demo", Arc::new(map), CoverageConfig::default());
//! let mut recorder = session.recorder();
//! recorder.begin_test(TestIdentity::new(TestId::new(1), "testAdd() void"));
//! recorder.record_hit(SourceLocation::new(file, 10));
//! recorder.record_hit(SourceLocation::new(file, 11));
//! let _ = session.complete(recorder);
//!
//! let report = session.finish();
//! assert_eq!(report.summary.covered_lines, 2);
//! assert_eq!(report.summary.total_lines, 6);
//! # Ok::<(), linecov::LinecovError>(())
//! ```

#![warn(missing_docs)]

mod aggregator;
mod config;
mod diagnostics;
mod exporter;
pub mod formatters;
mod ids;
mod line_coverage;
pub mod logging;
mod page_data;
mod recorder;
mod result;
mod session;
mod source_map;
mod summarizer;

pub use aggregator::{AggregatorStats, MergeReport, RunAggregator};
pub use config::{Attribution, CoverageConfig, CoverageConfigBuilder, EmptyTotalPolicy};
pub use diagnostics::{DiagnosticSeverity, Diagnostics, MergeDiagnostic, DEFAULT_MAX_DIAGNOSTICS};
pub use exporter::{
    ClassRecord, FileReport, MethodRecord, PageDataRecord, ReportModel, ReportModelExporter,
    TestTarget,
};
pub use formatters::{CloverJsFormatter, JsonFormatter, LcovFormatter, ReportFormatter};
pub use ids::{ClassId, FileId, HitEvent, MethodId, SourceLocation, TestId, TestIdentity};
pub use line_coverage::{LineCoverage, TestRegistration};
pub use page_data::{CloverPage, PageClass, PageData, PageMethod};
pub use recorder::{HitRecorder, DEFAULT_RECORDER_CAPACITY};
pub use result::{LinecovError, LinecovResult};
pub use session::{CoverageSession, SessionReport, ShardOutcome};
pub use source_map::{
    ClassDescriptor, FileDescriptor, LineResolution, MethodDescriptor, SourceMap, MAX_LINE_COUNT,
};
pub use summarizer::{
    ClassCoverage, CoverageSummarizer, CoverageSummary, FileCoverage, MethodCoverage,
};
