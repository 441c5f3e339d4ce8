use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{warn, Level};

use super::handlers::{debug, health, metrics};
use super::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors_origin = state.config.server.cors_origin.clone();

    let router = Router::new()
        .route("/healthz", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .route("/api/debug/compare-index", get(debug::compare_index))
        .layer(
            ServiceBuilder::new().layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            ),
        )
        .with_state(state);

    match cors_origin.map(|o| o.parse::<HeaderValue>()) {
        Some(Ok(origin)) => router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET]),
        ),
        Some(Err(e)) => {
            warn!(error = %e, "invalid server.cors_origin, CORS disabled");
            router
        }
        None => router,
    }
}
