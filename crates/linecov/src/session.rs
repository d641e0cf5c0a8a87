//! Coverage Session
//!
//! A session is an owned value: constructing it starts collection and
//! [`CoverageSession::finish`] tears it down, yielding the final report.
//! Execution contexts obtain a [`HitRecorder`] from the session, record
//! without synchronization, and hand it back with
//! [`CoverageSession::complete`] (merge) or [`CoverageSession::abort`]
//! (discard). [`CoverageSession::run_shards`] does this for a batch of
//! shards on scoped threads.

use crate::aggregator::{AggregatorStats, MergeReport, RunAggregator};
use crate::config::CoverageConfig;
use crate::diagnostics::Diagnostics;
use crate::exporter::{ReportModel, ReportModelExporter};
use crate::line_coverage::LineCoverage;
use crate::recorder::HitRecorder;
use crate::source_map::SourceMap;
use crate::summarizer::{CoverageSummarizer, CoverageSummary};
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What happened to one shard
#[derive(Debug)]
pub enum ShardOutcome<E> {
    /// The shard succeeded and its hits were merged
    Merged {
        /// Shard position in the input
        index: usize,
        /// Merge result
        report: MergeReport,
    },
    /// The shard returned an error; its hits were discarded
    Failed {
        /// Shard position in the input
        index: usize,
        /// Error returned by the shard
        error: E,
    },
    /// The shard panicked; its hits were discarded
    Panicked {
        /// Shard position in the input
        index: usize,
        /// Panic payload, if it was a string
        message: String,
    },
}

impl<E> ShardOutcome<E> {
    /// Shard position in the input
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Merged { index, .. } | Self::Failed { index, .. } | Self::Panicked { index, .. } => {
                *index
            }
        }
    }

    /// Whether the shard's hits were merged
    #[must_use]
    pub const fn is_merged(&self) -> bool {
        matches!(self, Self::Merged { .. })
    }
}

/// Everything a finished session produced
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Session name
    pub name: String,
    /// Canonical coverage
    pub coverage: LineCoverage,
    /// Rollups
    pub summary: CoverageSummary,
    /// Renderer input
    pub report: ReportModel,
    /// Merge diagnostics
    pub diagnostics: Diagnostics,
    /// Aggregator counters at teardown
    pub stats: AggregatorStats,
    /// Contexts whose hits were merged
    pub contexts_completed: u64,
    /// Contexts whose hits were discarded
    pub contexts_aborted: u64,
    /// Wall time from start to finish
    pub duration: Duration,
}

/// One coverage collection session
#[derive(Debug)]
pub struct CoverageSession {
    name: String,
    config: CoverageConfig,
    aggregator: RunAggregator,
    started: Instant,
    completed: AtomicU64,
    aborted: AtomicU64,
}

impl CoverageSession {
    /// Start a session over an immutable source map
    #[must_use]
    pub fn new(name: impl Into<String>, source_map: Arc<SourceMap>, config: CoverageConfig) -> Self {
        let name = name.into();
        tracing::info!(
            session = %name,
            files = source_map.file_count(),
            methods = source_map.method_count(),
            "coverage session started"
        );
        Self {
            aggregator: RunAggregator::with_config(source_map, &config),
            name,
            config,
            started: Instant::now(),
            completed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
        }
    }

    /// Session name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session configuration
    #[must_use]
    pub const fn config(&self) -> &CoverageConfig {
        &self.config
    }

    /// The session's source map
    #[must_use]
    pub fn source_map(&self) -> &Arc<SourceMap> {
        self.aggregator.source_map()
    }

    /// New recorder for one execution context
    #[must_use]
    pub fn recorder(&self) -> HitRecorder {
        HitRecorder::with_capacity(self.config.recorder_capacity)
    }

    /// Drain a finished context's recorder into the canonical model
    pub fn complete(&self, mut recorder: HitRecorder) -> MergeReport {
        let report = self.aggregator.merge(recorder.drain());
        let _ = self.completed.fetch_add(1, Ordering::Relaxed);
        report
    }

    /// Discard an aborted context's recorder; none of its hits are merged
    pub fn abort(&self, recorder: HitRecorder) {
        recorder.abandon();
        let _ = self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Merge a partial produced outside this session's recorders
    pub fn merge(&self, partial: LineCoverage) -> MergeReport {
        self.aggregator.merge(partial)
    }

    /// Run each shard on its own scoped thread with its own recorder
    ///
    /// Shards returning `Ok` are merged as they finish. Shards returning
    /// `Err` or panicking are aborted. Outcomes are returned in input order.
    pub fn run_shards<S, E, F>(&self, shards: Vec<S>, run: F) -> Vec<ShardOutcome<E>>
    where
        S: Send,
        E: Send,
        F: Fn(S, &mut HitRecorder) -> Result<(), E> + Sync,
    {
        let span = tracing::info_span!("run_shards", session = %self.name, shards = shards.len());
        let _entered = span.enter();
        let run = &run;

        let outcomes: Vec<ShardOutcome<E>> = std::thread::scope(|scope| {
            let handles: Vec<_> = shards
                .into_iter()
                .enumerate()
                .map(|(index, shard)| {
                    let span = span.clone();
                    scope.spawn(move || span.in_scope(|| self.run_shard(index, shard, run)))
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| {
                    handle.join().unwrap_or_else(|payload| ShardOutcome::Panicked {
                        index,
                        message: panic_message(payload.as_ref()),
                    })
                })
                .collect()
        });

        let merged = outcomes.iter().filter(|o| o.is_merged()).count();
        tracing::info!(merged, failed = outcomes.len() - merged, "shards finished");
        outcomes
    }

    fn run_shard<S, E, F>(&self, index: usize, shard: S, run: &F) -> ShardOutcome<E>
    where
        F: Fn(S, &mut HitRecorder) -> Result<(), E>,
    {
        let mut recorder = self.recorder();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| run(shard, &mut recorder)));
        match result {
            Ok(Ok(())) => ShardOutcome::Merged {
                index,
                report: self.complete(recorder),
            },
            Ok(Err(error)) => {
                tracing::warn!(shard = index, "shard failed, discarding its hits");
                self.abort(recorder);
                ShardOutcome::Failed { index, error }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(shard = index, %message, "shard panicked, discarding its hits");
                self.abort(recorder);
                ShardOutcome::Panicked { index, message }
            }
        }
    }

    /// Consistent copy of the canonical coverage
    #[must_use]
    pub fn snapshot(&self) -> LineCoverage {
        self.aggregator.snapshot()
    }

    /// Rollups over a consistent snapshot
    #[must_use]
    pub fn summary(&self) -> CoverageSummary {
        CoverageSummarizer::from_config(&self.config)
            .summarize(&self.snapshot(), self.aggregator.source_map())
    }

    /// Aggregator counters
    #[must_use]
    pub fn stats(&self) -> AggregatorStats {
        self.aggregator.stats()
    }

    /// End the session and build the final report
    #[must_use]
    pub fn finish(self) -> SessionReport {
        let stats = self.aggregator.stats();
        let source_map = Arc::clone(self.aggregator.source_map());
        let (coverage, diagnostics) = self.aggregator.into_parts();

        let summary = CoverageSummarizer::from_config(&self.config).summarize(&coverage, &source_map);
        let report = ReportModelExporter::from_config(&self.config).export(
            &coverage,
            &summary,
            &source_map,
        );
        let duration = self.started.elapsed();
        let contexts_completed = self.completed.into_inner();
        let contexts_aborted = self.aborted.into_inner();

        tracing::info!(
            session = %self.name,
            covered_lines = summary.covered_lines,
            total_lines = summary.total_lines,
            contexts_completed,
            contexts_aborted,
            diagnostics = diagnostics.total(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "coverage session finished"
        );

        SessionReport {
            name: self.name,
            coverage,
            summary,
            report,
            diagnostics,
            stats,
            contexts_completed,
            contexts_aborted,
            duration,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
