//! The bounded worker pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::FindxError;
use crate::metrics::FindxMetrics;

/// Queue capacity used when the configuration leaves it unset.
pub const DEFAULT_BUFFER_SIZE: usize = 128;
/// Worker count used when the configuration leaves it unset.
pub const DEFAULT_THREAD_COUNT: usize = 1;

/// Per-keyspace FindX settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FindxConfig {
    pub enabled: bool,
    pub url: String,
    /// Queue capacity; values below 1 fall back to [`DEFAULT_BUFFER_SIZE`].
    pub buffer_size: usize,
    /// Worker count; values below 1 fall back to [`DEFAULT_THREAD_COUNT`].
    pub thread_count: usize,
}

/// A running FindX pool for one keyspace.
///
/// `add` is the only operation on the request path and never blocks: the
/// id either lands in the queue or is dropped and counted. `close` flips
/// the pool disabled, closes the queue and waits for the workers to drain
/// the backlog.
pub struct FindxPool {
    keyspace: String,
    enabled: AtomicBool,
    tx: Mutex<Option<flume::Sender<String>>>,
    workers: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<dyn FindxMetrics>,
}

impl FindxPool {
    /// Validates the configuration, spawns the workers and returns the
    /// running pool. Must be called from within a tokio runtime.
    pub fn start(
        keyspace: &str,
        config: &FindxConfig,
        client: reqwest::Client,
        user_agent: &str,
        metrics: Arc<dyn FindxMetrics>,
    ) -> Result<Arc<Self>, FindxError> {
        if !config.enabled {
            return Err(FindxError::Disabled);
        }
        let base_url = reqwest::Url::parse(&config.url)
            .map_err(|e| FindxError::InvalidUrl(format!("{}: {e}", config.url)))?;

        let buffer_size = if config.buffer_size < 1 {
            DEFAULT_BUFFER_SIZE
        } else {
            config.buffer_size
        };
        let thread_count = if config.thread_count < 1 {
            DEFAULT_THREAD_COUNT
        } else {
            config.thread_count
        };

        let (tx, rx) = flume::bounded::<String>(buffer_size);
        let mut workers = Vec::with_capacity(thread_count);
        for _ in 0..thread_count {
            let rx = rx.clone();
            let client = client.clone();
            let base_url = base_url.clone();
            let user_agent = user_agent.to_owned();
            let metrics = metrics.clone();
            let device_mapping = keyspace == "dm";
            workers.push(tokio::spawn(async move {
                if device_mapping {
                    run_dm(rx, client, base_url, user_agent, metrics).await;
                } else {
                    run(rx, client, base_url, user_agent, metrics).await;
                }
            }));
        }

        Ok(Arc::new(Self {
            keyspace: keyspace.to_owned(),
            enabled: AtomicBool::new(true),
            tx: Mutex::new(Some(tx)),
            workers: tokio::sync::Mutex::new(workers),
            metrics,
        }))
    }

    #[must_use]
    pub fn keyspace(&self) -> &str {
        &self.keyspace
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Non-blocking enqueue. Drops the id and counts a failure when the
    /// queue is full. No-op once the pool is closed.
    pub fn add(&self, id: impl Into<String>) {
        if !self.is_enabled() {
            return;
        }
        let guard = self
            .tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(tx) = guard.as_ref() else { return };
        match tx.try_send(id.into()) {
            Ok(()) => self.metrics.add_suc(),
            Err(_) => self.metrics.add_fail(),
        }
    }

    /// Records a policy rejection without touching the queue.
    pub fn reject(&self) {
        if self.is_enabled() {
            self.metrics.add_rej();
        }
    }

    /// Disables the pool, closes the queue and waits for the workers to
    /// finish draining it.
    pub async fn close(&self) {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            return;
        }
        drop(
            self.tx
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take(),
        );
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
    }
}

/// Default worker: `GET <url><id>`.
async fn run(
    rx: flume::Receiver<String>,
    client: reqwest::Client,
    base_url: reqwest::Url,
    user_agent: String,
    metrics: Arc<dyn FindxMetrics>,
) {
    while let Ok(id) = rx.recv_async().await {
        let url = format!("{base_url}{id}");
        send(&client, &url, &user_agent, metrics.as_ref()).await;
    }
}

/// Device-mapping worker: the id is `<primary>,<devices>` and maps to
/// `GET <url><primary>?devices=<devices>`.
async fn run_dm(
    rx: flume::Receiver<String>,
    client: reqwest::Client,
    base_url: reqwest::Url,
    user_agent: String,
    metrics: Arc<dyn FindxMetrics>,
) {
    while let Ok(id) = rx.recv_async().await {
        let mut parts = id.splitn(2, ',');
        let (Some(primary), Some(devices)) = (parts.next(), parts.next()) else {
            metrics.sent_fail();
            continue;
        };
        let url = format!("{base_url}{primary}?devices={devices}");
        send(&client, &url, &user_agent, metrics.as_ref()).await;
    }
}

async fn send(client: &reqwest::Client, url: &str, user_agent: &str, metrics: &dyn FindxMetrics) {
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await;
    match response {
        Ok(resp) => {
            let status = resp.status().as_u16();
            // Drain the body so the connection can be kept alive.
            let _ = resp.bytes().await;
            match status {
                s if s < 300 => metrics.sent_suc(),
                s if s < 500 => {
                    debug!(status = s, url = %url, "FindX rejected request");
                    metrics.sent_rej();
                }
                s => {
                    debug!(status = s, url = %url, "FindX request failed");
                    metrics.sent_fail();
                }
            }
        }
        Err(err) => {
            debug!(error = %err, url = %url, "FindX request error");
            metrics.sent_fail();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopFindxMetrics;
    use axum::extract::{Path, Query, State};
    use axum::routing::get;
    use axum::Router;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingMetrics {
        add_suc: AtomicU64,
        add_fail: AtomicU64,
        add_rej: AtomicU64,
        sent_suc: AtomicU64,
        sent_fail: AtomicU64,
        sent_rej: AtomicU64,
    }

    impl FindxMetrics for CountingMetrics {
        fn add_suc(&self) {
            self.add_suc.fetch_add(1, Ordering::Relaxed);
        }
        fn add_fail(&self) {
            self.add_fail.fetch_add(1, Ordering::Relaxed);
        }
        fn add_rej(&self) {
            self.add_rej.fetch_add(1, Ordering::Relaxed);
        }
        fn sent_suc(&self) {
            self.sent_suc.fetch_add(1, Ordering::Relaxed);
        }
        fn sent_fail(&self) {
            self.sent_fail.fetch_add(1, Ordering::Relaxed);
        }
        fn sent_rej(&self) {
            self.sent_rej.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[derive(Clone, Default)]
    struct Target {
        status: u16,
        hits: Arc<tokio::sync::Mutex<Vec<(String, HashMap<String, String>, Option<String>)>>>,
        gate: Option<Arc<tokio::sync::Semaphore>>,
    }

    /// Serves `/findx/{id}` with a fixed status, recording id, query and
    /// User-Agent of each hit. When gated, handlers block on the
    /// semaphore so workers can be held mid-request.
    async fn spawn_target(target: Target) -> String {
        async fn handler(
            State(target): State<Target>,
            Path(id): Path<String>,
            Query(query): Query<HashMap<String, String>>,
            headers: axum::http::HeaderMap,
        ) -> axum::http::StatusCode {
            let ua = headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            target.hits.lock().await.push((id, query, ua));
            if let Some(gate) = &target.gate {
                let _permit = gate.acquire().await;
            }
            axum::http::StatusCode::from_u16(target.status).unwrap()
        }

        let app = Router::new()
            .route("/findx/{id}", get(handler))
            .with_state(target);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/findx/")
    }

    fn config(url: &str) -> FindxConfig {
        FindxConfig {
            enabled: true,
            url: url.to_owned(),
            buffer_size: 0,
            thread_count: 0,
        }
    }

    #[tokio::test]
    async fn start_requires_enabled_and_valid_url() {
        let client = reqwest::Client::new();
        let metrics: Arc<dyn FindxMetrics> = Arc::new(NoopFindxMetrics);

        let disabled = FindxConfig::default();
        assert!(matches!(
            FindxPool::start("pa", &disabled, client.clone(), "xdas", metrics.clone()),
            Err(FindxError::Disabled)
        ));

        let bad_url = FindxConfig {
            enabled: true,
            url: "not a url".to_owned(),
            ..FindxConfig::default()
        };
        assert!(matches!(
            FindxPool::start("pa", &bad_url, client.clone(), "xdas", metrics.clone()),
            Err(FindxError::InvalidUrl(_))
        ));

        let ok = config("http://127.0.0.1:1/findx/");
        let pool = FindxPool::start("pa", &ok, client, "xdas", metrics).unwrap();
        assert!(pool.is_enabled());
        pool.close().await;
        assert!(!pool.is_enabled());
    }

    #[tokio::test]
    async fn delivers_with_user_agent_and_classifies_success() {
        let target = Target {
            status: 202,
            ..Target::default()
        };
        let hits = target.hits.clone();
        let url = spawn_target(target).await;

        let metrics = Arc::new(CountingMetrics::default());
        let pool = FindxPool::start(
            "pa",
            &config(&url),
            reqwest::Client::new(),
            "xdas",
            metrics.clone(),
        )
        .unwrap();

        for _ in 0..10 {
            pool.add("TESTID");
        }
        pool.close().await;

        assert_eq!(metrics.add_suc.load(Ordering::Relaxed), 10);
        assert_eq!(metrics.sent_suc.load(Ordering::Relaxed), 10);
        let hits = hits.lock().await;
        assert_eq!(hits.len(), 10);
        for (id, _, ua) in hits.iter() {
            assert_eq!(id, "TESTID");
            assert_eq!(ua.as_deref(), Some("xdas"));
        }
    }

    #[tokio::test]
    async fn classifies_client_and_server_errors() {
        for (status, expect_rej, expect_fail) in [(400u16, 10u64, 0u64), (500, 0, 10)] {
            let url = spawn_target(Target {
                status,
                ..Target::default()
            })
            .await;
            let metrics = Arc::new(CountingMetrics::default());
            let pool = FindxPool::start(
                "pa",
                &config(&url),
                reqwest::Client::new(),
                "xdas",
                metrics.clone(),
            )
            .unwrap();
            for _ in 0..10 {
                pool.add("X");
            }
            pool.close().await;
            assert_eq!(metrics.sent_rej.load(Ordering::Relaxed), expect_rej);
            assert_eq!(metrics.sent_fail.load(Ordering::Relaxed), expect_fail);
        }
    }

    #[tokio::test]
    async fn unreachable_target_counts_failures() {
        let metrics = Arc::new(CountingMetrics::default());
        let pool = FindxPool::start(
            "pa",
            &config("http://127.0.0.1:1/findx/"),
            reqwest::Client::new(),
            "xdas",
            metrics.clone(),
        )
        .unwrap();
        pool.add("X");
        pool.close().await;
        assert_eq!(metrics.sent_fail.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn full_queue_drops_ids() {
        // One worker held mid-request, queue of one: the first id is
        // in-flight, the second fills the queue, the rest must drop.
        let gate = Arc::new(tokio::sync::Semaphore::new(0));
        let target = Target {
            status: 200,
            gate: Some(gate.clone()),
            ..Target::default()
        };
        let hits = target.hits.clone();
        let url = spawn_target(target).await;

        let metrics = Arc::new(CountingMetrics::default());
        let pool = FindxPool::start(
            "pa",
            &FindxConfig {
                enabled: true,
                url,
                buffer_size: 1,
                thread_count: 1,
            },
            reqwest::Client::new(),
            "xdas",
            metrics.clone(),
        )
        .unwrap();

        pool.add("FIRST");
        // Wait until the worker has taken FIRST and is blocked in the call.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while hits.lock().await.is_empty() {
            assert!(tokio::time::Instant::now() < deadline, "worker never started");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        pool.add("SECOND"); // fills the queue
        for _ in 0..8 {
            pool.add("DROPPED");
        }
        assert_eq!(metrics.add_suc.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.add_fail.load(Ordering::Relaxed), 8);

        gate.add_permits(16);
        pool.close().await;
        assert_eq!(metrics.sent_suc.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn dm_ids_split_into_query() {
        let target = Target {
            status: 200,
            ..Target::default()
        };
        let hits = target.hits.clone();
        let url = spawn_target(target).await;

        let metrics = Arc::new(CountingMetrics::default());
        let pool = FindxPool::start(
            "dm",
            &config(&url),
            reqwest::Client::new(),
            "xdas",
            metrics.clone(),
        )
        .unwrap();

        pool.add("PRIMARY,dev1");
        pool.add("malformed");
        pool.close().await;

        assert_eq!(metrics.sent_suc.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.sent_fail.load(Ordering::Relaxed), 1);
        let hits = hits.lock().await;
        assert_eq!(hits.len(), 1);
        let (id, query, _) = &hits[0];
        assert_eq!(id, "PRIMARY");
        assert_eq!(query.get("devices").map(String::as_str), Some("dev1"));
    }

    #[tokio::test]
    async fn closed_pool_ignores_adds_and_rejects() {
        let metrics = Arc::new(CountingMetrics::default());
        let pool = FindxPool::start(
            "pa",
            &config("http://127.0.0.1:1/findx/"),
            reqwest::Client::new(),
            "xdas",
            metrics.clone(),
        )
        .unwrap();
        pool.reject();
        pool.close().await;
        pool.add("LATE");
        pool.reject();
        assert_eq!(metrics.add_rej.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.add_suc.load(Ordering::Relaxed), 0);
    }
}
