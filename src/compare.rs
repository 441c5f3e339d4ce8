//! Before/after index comparison.
//!
//! A run moves through `Phase`s strictly in order:
//!
//! ```text
//! Idle -> VerifyingSource -> Provisioning -> Before -> CreatingIndex
//!      -> After -> CollectingStats -> [CleaningUp] -> Done
//! ```
//!
//! Any fatal error moves the run to `Failed`. Explain failures and index
//! drops never fail a run; timing, index creation and stats failures do.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::config::DiagnosticsConfig;
use crate::error::{MarqueeError, Result};
use crate::explain::{self, ExplainOutcome, ExplainSummary};
use crate::index::IndexLifecycle;
use crate::metrics::{self, GaugeGuard};
use crate::provision::{self, ProvisionOutcome};
use crate::store::DocumentStore;
use crate::timing::{self, Clock, TimingSample};
use crate::types::{CollStats, QuerySpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    VerifyingSource,
    Provisioning,
    Before,
    CreatingIndex,
    After,
    CollectingStats,
    CleaningUp,
    Done,
    Failed,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::VerifyingSource => "verifying_source",
            Phase::Provisioning => "provisioning",
            Phase::Before => "before",
            Phase::CreatingIndex => "creating_index",
            Phase::After => "after",
            Phase::CollectingStats => "collecting_stats",
            Phase::CleaningUp => "cleaning_up",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current phase of one run, logging every transition.
#[derive(Debug)]
struct PhaseTracker {
    current: Phase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            current: Phase::Idle,
        }
    }

    fn enter(&mut self, next: Phase) {
        debug!(from = %self.current, to = %next, "phase transition");
        self.current = next;
    }
}

#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Provision the demo collection if it does not exist yet.
    pub copy_to_demo: bool,
    /// Drop the created index once the report is assembled.
    pub drop_index_after: bool,
    pub runs: usize,
    pub query: QuerySpec,
    /// On provisioning failure, measure the source collection instead of
    /// failing. The report is flagged `degraded`.
    pub allow_source_fallback: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            copy_to_demo: false,
            drop_index_after: false,
            runs: 5,
            query: QuerySpec::default(),
            allow_source_fallback: false,
        }
    }
}

impl CompareOptions {
    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        Self {
            runs: config.default_runs,
            query: QuerySpec::movies(&config.default_genre, config.default_min_year),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub collection: String,
    /// The run measured the source collection rather than the demo copy.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning: Option<ProvisionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_error: Option<String>,
    pub query: serde_json::Value,
    pub runs: usize,
    pub dropped_existing_index: bool,
    pub explain_before: ExplainOutcome,
    pub summary_before: Option<ExplainSummary>,
    pub times_before: TimingSample,
    pub explain_after: ExplainOutcome,
    pub summary_after: Option<ExplainSummary>,
    pub times_after: TimingSample,
    pub median_before: f64,
    pub median_after: f64,
    pub index_name: String,
    pub index_dropped: bool,
    pub coll_stats: CollStats,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: f64,
}

impl ComparisonReport {
    /// Metric/value rows for a human-readable summary.
    pub fn summary_rows(&self) -> Vec<(&'static str, String)> {
        fn opt(v: Option<u64>) -> String {
            v.map(|n| n.to_string()).unwrap_or_else(|| "n/a".to_string())
        }
        let before = self.summary_before.clone().unwrap_or_default();
        let after = self.summary_after.clone().unwrap_or_default();

        vec![
            ("collection", self.collection.clone()),
            ("stage_before", before.stage.unwrap_or_else(|| "n/a".into())),
            ("executionTimeMillis_before", opt(before.execution_time_millis)),
            ("totalDocsExamined_before", opt(before.total_docs_examined)),
            ("totalKeysExamined_before", opt(before.total_keys_examined)),
            ("medianRuntimeMs_before", format!("{:.3}", self.median_before)),
            ("stage_after", after.stage.unwrap_or_else(|| "n/a".into())),
            ("executionTimeMillis_after", opt(after.execution_time_millis)),
            ("totalDocsExamined_after", opt(after.total_docs_examined)),
            ("totalKeysExamined_after", opt(after.total_keys_examined)),
            ("medianRuntimeMs_after", format!("{:.3}", self.median_after)),
            ("index_name", self.index_name.clone()),
            ("index_totalIndexSize", self.coll_stats.total_index_size.to_string()),
        ]
    }
}

/// Runs index comparisons against one store.
pub struct Comparator<'a> {
    store: &'a dyn DocumentStore,
    clock: &'a dyn Clock,
    source: String,
    demo: String,
    batch_size: usize,
}

impl<'a> Comparator<'a> {
    pub fn new(store: &'a dyn DocumentStore, clock: &'a dyn Clock, config: &DiagnosticsConfig) -> Self {
        Self {
            store,
            clock,
            source: config.source_collection.clone(),
            demo: config.demo_collection.clone(),
            batch_size: config.copy_batch_size,
        }
    }

    #[instrument(skip_all, fields(source = %self.source, demo = %self.demo, runs = options.runs))]
    pub async fn run(&self, options: &CompareOptions) -> Result<ComparisonReport> {
        metrics::ACTIVE_COMPARISONS.inc();
        let _guard = GaugeGuard(&metrics::ACTIVE_COMPARISONS);

        let mut tracker = PhaseTracker::new();
        match self.execute(options, &mut tracker).await {
            Ok(report) => {
                metrics::COMPARISONS_TOTAL.with_label_values(&["ok"]).inc();
                metrics::COMPARISON_DURATION.observe(report.elapsed_ms / 1000.0);
                metrics::MEDIAN_LATENCY_MS
                    .with_label_values(&[&report.collection, "before"])
                    .set(report.median_before);
                metrics::MEDIAN_LATENCY_MS
                    .with_label_values(&[&report.collection, "after"])
                    .set(report.median_after);

                info!(
                    collection = %report.collection,
                    median_before_ms = report.median_before,
                    median_after_ms = report.median_after,
                    index = %report.index_name,
                    "comparison complete"
                );
                Ok(report)
            }
            Err(e) => {
                error!(phase = %tracker.current, error = %e, "comparison failed");
                tracker.enter(Phase::Failed);
                metrics::COMPARISONS_TOTAL.with_label_values(&["failed"]).inc();
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        options: &CompareOptions,
        tracker: &mut PhaseTracker,
    ) -> Result<ComparisonReport> {
        if options.runs == 0 || options.runs > timing::MAX_RUNS {
            return Err(MarqueeError::Validation(format!(
                "runs must be between 1 and {}, got {}",
                timing::MAX_RUNS,
                options.runs
            )));
        }
        let started_at = Utc::now();
        let t0 = self.clock.now();

        tracker.enter(Phase::VerifyingSource);
        if !self.store.collection_exists(&self.source).await? {
            return Err(MarqueeError::SourceMissing {
                collection: self.source.clone(),
            });
        }

        tracker.enter(Phase::Provisioning);
        let target = self.choose_collection(options).await?;
        let collection = target.collection.as_str();

        tracker.enter(Phase::Before);
        let keys = options.query.index_keys();
        let indexes = IndexLifecycle::new(self.store, collection);
        let dropped_existing_index = indexes.drop_if_exists(&keys).await;
        let (explain_before, times_before) = self
            .measure(collection, options)
            .await
            .map_err(|e| MarqueeError::Measurement {
                phase: Phase::Before,
                source: Box::new(e),
            })?;

        tracker.enter(Phase::CreatingIndex);
        let index_name = indexes.create(&keys).await?;

        tracker.enter(Phase::After);
        let (explain_after, times_after) = self
            .measure(collection, options)
            .await
            .map_err(|e| MarqueeError::Measurement {
                phase: Phase::After,
                source: Box::new(e),
            })?;

        tracker.enter(Phase::CollectingStats);
        let coll_stats = self
            .store
            .coll_stats(collection)
            .await
            .map_err(|e| MarqueeError::Measurement {
                phase: Phase::CollectingStats,
                source: Box::new(e),
            })?;

        let index_dropped = if options.drop_index_after {
            tracker.enter(Phase::CleaningUp);
            indexes.drop(&index_name).await
        } else {
            false
        };

        tracker.enter(Phase::Done);
        let elapsed_ms = self.clock.now().saturating_sub(t0).as_nanos() as f64 / 1_000_000.0;

        Ok(ComparisonReport {
            collection: target.collection.clone(),
            degraded: target.degraded,
            provisioning: target.provisioning,
            provisioning_error: target.provisioning_error,
            query: options.query.to_json(),
            runs: options.runs,
            dropped_existing_index,
            summary_before: explain_before.summary(),
            explain_before,
            median_before: times_before.median(),
            times_before,
            summary_after: explain_after.summary(),
            explain_after,
            median_after: times_after.median(),
            times_after,
            index_name,
            index_dropped,
            coll_stats,
            started_at,
            elapsed_ms,
        })
    }

    /// Pick the collection to experiment on, provisioning the demo copy
    /// when asked to.
    async fn choose_collection(&self, options: &CompareOptions) -> Result<Target> {
        if self.store.collection_exists(&self.demo).await? {
            let outcome = options.copy_to_demo.then(ProvisionOutcome::existing);
            return Ok(Target::demo(&self.demo, outcome));
        }

        if !options.copy_to_demo {
            warn!(
                source = %self.source,
                demo = %self.demo,
                "demo collection missing and copy not requested, measuring the source collection"
            );
            return Ok(Target::source(&self.source, None));
        }

        match provision::ensure_demo_collection(self.store, &self.source, &self.demo, self.batch_size)
            .await
        {
            Ok(outcome) => Ok(Target::demo(&self.demo, Some(outcome))),
            Err(e @ MarqueeError::Provisioning { .. }) if options.allow_source_fallback => {
                warn!(error = %e, "provisioning failed, measuring the source collection");
                Ok(Target::source(&self.source, Some(e.to_string())))
            }
            Err(e) => Err(e),
        }
    }

    /// Explain once, then time `options.runs` executions.
    async fn measure(
        &self,
        collection: &str,
        options: &CompareOptions,
    ) -> Result<(ExplainOutcome, TimingSample)> {
        let explain = explain::collect(self.store, collection, &options.query).await;
        let times =
            timing::run_timed(self.store, collection, &options.query, options.runs, self.clock)
                .await?;
        Ok((explain, times))
    }
}

struct Target {
    collection: String,
    degraded: bool,
    provisioning: Option<ProvisionOutcome>,
    provisioning_error: Option<String>,
}

impl Target {
    fn demo(name: &str, provisioning: Option<ProvisionOutcome>) -> Self {
        Self {
            collection: name.to_string(),
            degraded: false,
            provisioning,
            provisioning_error: None,
        }
    }

    fn source(name: &str, provisioning_error: Option<String>) -> Self {
        Self {
            collection: name.to_string(),
            degraded: true,
            provisioning: None,
            provisioning_error,
        }
    }
}
