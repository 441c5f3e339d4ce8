pub mod debug;
pub mod health;
pub mod metrics;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::MarqueeError;

/// Wrapper that converts `MarqueeError` into an HTTP response.
pub struct ApiError(pub MarqueeError);

impl From<MarqueeError> for ApiError {
    fn from(e: MarqueeError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let body = json!({
            "error": self.0.to_string(),
            "status": status,
            "phase": self.0.phase(),
            "causes": self.0.causes(),
        });
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            axum::Json(body),
        )
            .into_response()
    }
}
