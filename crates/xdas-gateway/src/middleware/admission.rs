//! Keyspace admission guard.
//!
//! Rejects unknown keyspaces (and non-atomic keyspaces on the atomic
//! endpoints) before the metrics recorder sees the request, so invalid
//! keyspace names cannot flood the label space.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::info;

use crate::error::ApiError;
use crate::keyspace::KeyspaceKind;
use crate::state::AppState;

/// Path shape inside `/v2`: `{keyspace}/{id}`, `inc/{keyspace}/{id}` or
/// `multi/{id}`.
pub async fn admission_guard(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let Some(rest) = req.uri().path().strip_prefix("/v2/") else {
        return next.run(req).await;
    };
    let mut segments = rest.split('/');

    match segments.next() {
        Some("multi") => {}
        Some("inc") => {
            let keyspace = segments.next().unwrap_or("");
            let atomic = state
                .keyspace(keyspace)
                .is_some_and(|ks| ks.kind == KeyspaceKind::Atomic);
            if !atomic {
                info!(keyspace = %keyspace, "invalid keyspace or not atomic inc");
                return ApiError::UnknownKeyspace(keyspace.to_owned()).into_response();
            }
        }
        Some(keyspace) if !keyspace.is_empty() => {
            if state.keyspace(keyspace).is_none() {
                info!(keyspace = %keyspace, "invalid keyspace");
                return ApiError::UnknownKeyspace(keyspace.to_owned()).into_response();
            }
        }
        _ => {}
    }

    next.run(req).await
}
