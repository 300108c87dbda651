//! Atomic counter endpoint.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use xdas_store::redis_key;

use super::redis_write_err;
use crate::duration::resolve_ttl;
use crate::error::ApiError;
use crate::keyspace::KeyspaceKind;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IncParams {
    n: Option<String>,
}

/// `PUT`/`POST /v2/inc/{keyspace}/{id}`
///
/// `INCRBY` + `EXPIRE` in one pipelined round-trip; `n` defaults to 1
/// (as does 0 or an unparseable value), and every call refreshes the TTL.
/// The response body is the post-increment counter value.
pub async fn atomic_inc(
    State(state): State<Arc<AppState>>,
    Path((keyspace, id)): Path<(String, String)>,
    Query(params): Query<IncParams>,
    headers: HeaderMap,
) -> Response {
    let id = id.to_uppercase();
    // Admission-filtered already; kept as a guard for direct router use.
    let Some(ks) = state.keyspace(&keyspace) else {
        return ApiError::UnknownKeyspace(keyspace).into_response();
    };
    if ks.kind != KeyspaceKind::Atomic {
        return ApiError::UnknownKeyspace(keyspace).into_response();
    }
    let key = redis_key(&keyspace, &id);

    let n = params
        .n
        .as_deref()
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(0);
    let n = if n == 0 { 1 } else { n };

    let ttl = resolve_ttl(
        headers.get("Xttl").and_then(|v| v.to_str().ok()),
        ks.ttl,
        ks.fallback_ttl,
    );

    match state.store.incr_by(&key, n, ttl).await {
        Ok(value) => value.to_string().into_response(),
        Err(err) => redis_write_err(err).into_response(),
    }
}
