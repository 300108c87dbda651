//! Multi-keyspace multipart retrieval.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info};
use xdas_store::{redis_key, redis_key_ct};

use super::{dispatch_findx, parse_bool, redis_read_err};
use crate::error::ApiError;
use crate::keyspace::Keyspace;
use crate::multipart::MultipartWriter;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MultiParams {
    ks: Option<String>,
    ct_hour: Option<String>,
    ct_quarter: Option<String>,
    nofindx: Option<String>,
}

/// `GET /v2/multi/{id}`
///
/// Resolves the requested keyspaces (default from configuration), issues
/// a single `MGET`, and streams one `multipart/mixed` part per hit with
/// the transcoded payload and a `Namespace` header. Zero parts is a 404.
pub async fn multi_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<MultiParams>,
) -> Response {
    let id = id.to_uppercase();
    let requested: Vec<String> = match params.ks.as_deref() {
        Some(list) if !list.is_empty() => list.split(',').map(str::to_owned).collect(),
        _ => state.config.multipart.keyspaces.clone(),
    };

    let ct_hour = params.ct_hour.as_deref().unwrap_or("");
    let ct_quarter = params.ct_quarter.as_deref().unwrap_or("");

    let mut entries: Vec<(Arc<Keyspace>, String)> = Vec::with_capacity(requested.len());
    for name in &requested {
        let Some(ks) = state.keyspace(name).cloned() else {
            info!(keyspace = %name, "unknown keyspace in multi request");
            continue;
        };
        let key = if name == "ct" {
            redis_key_ct(name, &id, ct_hour, ct_quarter)
        } else {
            redis_key(name, &id)
        };
        entries.push((ks, key));
    }
    if entries.is_empty() {
        return ApiError::NotFound.into_response();
    }

    let keys: Vec<String> = entries.iter().map(|(_, key)| key.clone()).collect();
    let results = match state.store.framed_mget(&keys).await {
        Ok(results) => results,
        Err(err) => return redis_read_err(err).into_response(),
    };

    let suppress_findx = parse_bool(params.nofindx.as_deref());
    let mut writer = MultipartWriter::new();

    for ((ks, key), result) in entries.iter().zip(results) {
        let Some((stored_mb, data)) = result else {
            if !suppress_findx {
                dispatch_findx(&state, ks, &id);
            }
            continue;
        };

        let (mb, body) = match state.converter.convert(&ks.name, stored_mb, ks.output, &data) {
            Ok(converted) => converted,
            Err(err) => {
                error!(keyspace = %ks.name, key = %key, error = %err, "data conversion error");
                continue;
            }
        };

        let namespace = if ks.name == "ct" {
            format!("ct_{ct_hour}_{ct_quarter}")
        } else {
            ks.name.clone()
        };
        let Ok(namespace) = HeaderValue::from_str(&namespace) else {
            error!(keyspace = %ks.name, "invalid namespace header value");
            continue;
        };

        let mut part_headers = HeaderMap::new();
        mb.set_content_headers(&mut part_headers);
        part_headers.insert("namespace", namespace);
        writer.part(&part_headers, &body);
    }

    if writer.part_count() == 0 {
        return ApiError::NotFound.into_response();
    }

    let content_type = writer.content_type();
    let Ok(content_type) = HeaderValue::from_str(&content_type) else {
        return ApiError::Conversion("invalid multipart boundary".to_owned()).into_response();
    };
    (
        StatusCode::OK,
        [(CONTENT_TYPE, content_type)],
        writer.finish(),
    )
        .into_response()
}
