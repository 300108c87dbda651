//! Operational endpoints: `/metrics`, `/version`, `/healthz`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use crate::state::AppState;
use crate::{APP_NAME, BUILD_TIME};

/// `GET /version`
pub async fn version() -> Response {
    Json(serde_json::json!({
        "data": {
            "Version": format!("{APP_NAME}-{}", env!("CARGO_PKG_VERSION")),
            "BuildTime": BUILD_TIME,
        }
    }))
    .into_response()
}

/// `GET /healthz`
pub async fn healthz() -> Response {
    (StatusCode::OK, "OK\n").into_response()
}

/// `GET /metrics`
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::OK.into_response(),
    }
}
