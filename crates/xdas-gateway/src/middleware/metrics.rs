//! Request count and latency middleware.
//!
//! Emits `api_requests_total{app, code, method, keyspace, client}` and
//! `api_request_duration_seconds{app}`. The `client` label is the first
//! `/`-segment of the User-Agent, truncated to 12 characters. Applied
//! only to `/v2` routes, behind the admission guard.

use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use http::{Request, Response};
use metrics::{counter, histogram};
use tower::{Layer, Service};

use crate::APP_NAME;

/// Histogram buckets for `api_request_duration_seconds`.
pub const DURATION_BUCKETS: [f64; 9] = [0.001, 0.01, 0.03, 0.1, 0.5, 1.0, 3.0, 10.0, 130.0];

const MAX_CLIENT_LABEL: usize = 12;

/// Tower layer that records API request metrics.
#[derive(Clone, Default)]
pub struct ApiMetricsLayer;

impl ApiMetricsLayer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for ApiMetricsLayer {
    type Service = ApiMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiMetricsService { inner }
    }
}

/// The service wrapper that records metrics.
#[derive(Clone)]
pub struct ApiMetricsService<S> {
    inner: S,
}

impl<S, ResBody> Service<Request<Body>> for ApiMetricsService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let keyspace = extract_keyspace(req.uri().path()).to_owned();
        let client = req
            .headers()
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(client_label)
            .unwrap_or_default();

        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let result = inner.call(req).await;

            if let Ok(response) = &result {
                counter!(
                    "api_requests_total",
                    "app" => APP_NAME,
                    "code" => response.status().as_u16().to_string(),
                    "method" => method,
                    "keyspace" => keyspace,
                    "client" => client
                )
                .increment(1);
                histogram!("api_request_duration_seconds", "app" => APP_NAME)
                    .record(start.elapsed().as_secs_f64());
            }

            result
        })
    }
}

/// Keyspace label from a `/v2` path: the first segment, or the segment
/// after `inc`; `multi` is its own label.
fn extract_keyspace(path: &str) -> &str {
    let Some(rest) = path.strip_prefix("/v2/") else {
        return "";
    };
    let mut segments = rest.split('/');
    match segments.next() {
        Some("inc") => segments.next().unwrap_or(""),
        Some(keyspace) => keyspace,
        None => "",
    }
}

fn client_label(user_agent: &str) -> String {
    let client = user_agent.split('/').next().unwrap_or("");
    let cut = client
        .char_indices()
        .nth(MAX_CLIENT_LABEL)
        .map_or(client.len(), |(i, _)| i);
    client[..cut].to_owned()
}
