//! Best-effort capture of planner execution statistics.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::store::DocumentStore;
use crate::types::QuerySpec;

/// Planner report for one phase, or the error that prevented capturing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExplainOutcome {
    Failed { error: String },
    Report(Value),
}

impl ExplainOutcome {
    pub fn error(&self) -> Option<&str> {
        match self {
            ExplainOutcome::Failed { error } => Some(error),
            ExplainOutcome::Report(_) => None,
        }
    }

    pub fn summary(&self) -> Option<ExplainSummary> {
        match self {
            ExplainOutcome::Report(report) => Some(ExplainSummary::from_report(report)),
            ExplainOutcome::Failed { .. } => None,
        }
    }
}

/// Explain `find(query)` on `collection`. Never fails: an error from the
/// store is logged and returned as `ExplainOutcome::Failed`.
pub async fn collect(
    store: &dyn DocumentStore,
    collection: &str,
    query: &QuerySpec,
) -> ExplainOutcome {
    match store.explain_find(collection, &query.to_filter()).await {
        Ok(report) => ExplainOutcome::Report(report),
        Err(e) => {
            warn!(collection, error = %e, "explain failed, continuing without it");
            ExplainOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// The handful of numbers worth comparing between phases.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainSummary {
    pub execution_time_millis: Option<u64>,
    pub total_docs_examined: Option<u64>,
    pub total_keys_examined: Option<u64>,
    pub n_returned: Option<u64>,
    /// Root stage of the winning plan.
    pub stage: Option<String>,
    /// Index used by the first IXSCAN stage, if any.
    pub index_name: Option<String>,
    /// Whether a COLLSCAN appears anywhere in the stage tree.
    pub collection_scan: bool,
}

fn number(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
}

impl ExplainSummary {
    pub fn from_report(report: &Value) -> Self {
        let stats = report.get("executionStats").unwrap_or(report);
        let root = stats.get("executionStages");

        let mut summary = ExplainSummary {
            execution_time_millis: number(stats.get("executionTimeMillis")),
            total_docs_examined: number(stats.get("totalDocsExamined")),
            total_keys_examined: number(stats.get("totalKeysExamined")),
            n_returned: number(stats.get("nReturned")),
            stage: root
                .and_then(|s| s.get("stage"))
                .and_then(Value::as_str)
                .map(str::to_string),
            ..Default::default()
        };
        if let Some(root) = root {
            summary.visit(root);
        }
        summary
    }

    fn visit(&mut self, stage: &Value) {
        match stage.get("stage").and_then(Value::as_str) {
            Some("COLLSCAN") => self.collection_scan = true,
            Some("IXSCAN") if self.index_name.is_none() => {
                self.index_name = stage
                    .get("indexName")
                    .and_then(Value::as_str)
                    .map(str::to_string);
            }
            _ => {}
        }

        if let Some(input) = stage.get("inputStage") {
            self.visit(input);
        }
        if let Some(inputs) = stage.get("inputStages").and_then(Value::as_array) {
            for input in inputs {
                self.visit(input);
            }
        }
    }
}
