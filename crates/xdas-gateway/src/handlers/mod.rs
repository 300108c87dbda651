//! Request handlers.

mod atomic;
mod kv;
mod multi;
mod ops;

pub use atomic::atomic_inc;
pub use kv::{delete_value, get_value, put_value};
pub use multi::multi_get;
pub use ops::{healthz, metrics_endpoint, version};

use std::sync::Arc;

use axum::http::HeaderMap;
use metrics::counter;
use tracing::{error, warn};
use xdas_store::{redis_key, StoreError};

use crate::error::ApiError;
use crate::keyspace::Keyspace;
use crate::state::AppState;

/// Truthy check for query parameters: present without a value counts as
/// true, as does any true-ish literal.
pub(crate) fn parse_bool(value: Option<&str>) -> bool {
    match value {
        None => false,
        Some("") => true,
        Some(v) => matches!(v, "1" | "t" | "T" | "true" | "TRUE" | "True"),
    }
}

pub(crate) fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> &'h str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

pub(crate) fn redis_read_err(err: StoreError) -> ApiError {
    error!(error = %err, "redis read error");
    counter!("xdas_redis_errors_total", "ops" => "read").increment(1);
    ApiError::RedisRead(err.to_string())
}

pub(crate) fn redis_write_err(err: StoreError) -> ApiError {
    error!(error = %err, "redis write error");
    counter!("xdas_redis_errors_total", "ops" => "write").increment(1);
    ApiError::RedisWrite(err.to_string())
}

/// Queues a FindX backfill notification for a missed id.
///
/// The `pld` keyspace only refills when a companion `pa` entry exists;
/// that lookup runs off the request path.
pub(crate) fn dispatch_findx(state: &Arc<AppState>, keyspace: &Arc<Keyspace>, id: &str) {
    let Some(pool) = keyspace.findx.clone() else {
        return;
    };
    if keyspace.name == "pld" {
        let store = state.store.clone();
        let id = id.to_owned();
        tokio::spawn(async move {
            match store.exists(&redis_key("pa", &id)).await {
                Ok(true) => pool.add(id),
                Ok(false) => pool.reject(),
                Err(err) => {
                    warn!(error = %err, "companion keyspace lookup failed");
                    pool.reject();
                }
            }
        });
    } else {
        pool.add(id);
    }
}
