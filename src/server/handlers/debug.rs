use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::compare::{CompareOptions, Comparator, ComparisonReport};
use crate::error::MarqueeError;
use crate::server::AppState;
use crate::types::QuerySpec;

use super::ApiError;

/// `GET /api/debug/compare-index?copy=true&drop=true&runs=5&genre=Action&minYear=2010`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareParams {
    #[serde(default)]
    pub copy: bool,
    #[serde(default)]
    pub drop: bool,
    #[serde(default)]
    pub runs: Option<usize>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub min_year: Option<i64>,
    /// Measure the source collection if the demo copy cannot be made.
    #[serde(default)]
    pub fallback: bool,
}

#[instrument(skip_all)]
pub async fn compare_index(
    State(state): State<AppState>,
    params: Result<Query<CompareParams>, QueryRejection>,
) -> Result<Json<ComparisonReport>, ApiError> {
    let Query(params) =
        params.map_err(|rejection| MarqueeError::Validation(rejection.body_text()))?;
    debug!(
        copy = params.copy,
        drop = params.drop,
        runs = ?params.runs,
        "compare-index request"
    );

    let defaults = &state.config.diagnostics;
    let genre = params.genre.as_deref().unwrap_or(&defaults.default_genre);
    let options = CompareOptions {
        copy_to_demo: params.copy,
        drop_index_after: params.drop,
        runs: params.runs.unwrap_or(defaults.default_runs),
        query: QuerySpec::movies(genre, params.min_year.unwrap_or(defaults.default_min_year)),
        allow_source_fallback: params.fallback,
    };

    let _serialized = if state.config.server.serialize_comparisons {
        Some(state.comparison_lock.lock().await)
    } else {
        None
    };

    let comparator = Comparator::new(state.store.as_ref(), state.clock.as_ref(), defaults);
    let report = comparator.run(&options).await.map_err(ApiError::from)?;

    Ok(Json(report))
}
