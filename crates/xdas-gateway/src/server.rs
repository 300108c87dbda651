//! Router construction and server lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use metrics::gauge;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use xdas_codec::{messages, new_crypto, Converter, NoopConvertMetrics, RecorderConvertMetrics};
use xdas_codec::ConvertMetrics;
use xdas_findx::{FindxMetrics, FindxPool, NoopFindxMetrics, RecorderFindxMetrics};
use xdas_store::RedisStore;

use crate::config::{ConfigError, Configuration};
use crate::handlers;
use crate::keyspace::{Keyspace, KeyspaceKind};
use crate::middleware::{admission_guard, log_requests, ApiMetricsLayer};
use crate::middleware::metrics::DURATION_BUCKETS;
use crate::state::AppState;
use crate::{APP_NAME, BUILD_TIME, MAX_BODY_SIZE};

/// Graceful-shutdown deadline for draining FindX pools.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the application router.
///
/// Middleware, outermost first: verbose request logger, global body-size
/// limit, keyspace admission guard, request metrics.
pub fn router(state: Arc<AppState>) -> Router {
    let verbose = state.config.verbose;
    let no_metrics = state.config.no_metrics;

    let mut v2 = Router::new()
        .route("/v2/multi/{id}", get(handlers::multi_get))
        .route(
            "/v2/inc/{keyspace}/{id}",
            axum::routing::put(handlers::atomic_inc).post(handlers::atomic_inc),
        )
        .route(
            "/v2/{keyspace}/{id}",
            get(handlers::get_value)
                .put(handlers::put_value)
                .post(handlers::put_value)
                .delete(handlers::delete_value),
        );
    if !no_metrics {
        v2 = v2.layer(ApiMetricsLayer::new());
    }
    let v2 = v2.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        admission_guard,
    ));

    let mut app = v2
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/version", get(handlers::version))
        .route("/healthz", get(handlers::healthz))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));
    if verbose {
        app = app.layer(axum::middleware::from_fn(log_requests));
    }
    app.with_state(state)
}

/// Installs the Prometheus recorder with the API latency buckets and
/// registers the build-info gauge.
pub fn install_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("api_request_duration_seconds".to_owned()),
            &DURATION_BUCKETS,
        )?
        .install_recorder()?;
    gauge!(
        "xdas_build_info",
        "buildtime" => BUILD_TIME,
        "version" => env!("CARGO_PKG_VERSION")
    )
    .set(1.0);
    Ok(handle)
}

/// Starts the FindX pool of every keyspace that enables one. Startup
/// failures are logged and skipped; the gateway still serves the
/// keyspace, it just cannot backfill it.
pub fn start_findx_pools(
    config: &Configuration,
    client: &reqwest::Client,
) -> HashMap<String, Arc<FindxPool>> {
    let mut pools = HashMap::new();
    for (name, keyspace) in &config.keyspaces {
        if !keyspace.find_x.enabled {
            continue;
        }
        let metrics: Arc<dyn FindxMetrics> = if config.no_metrics {
            Arc::new(NoopFindxMetrics)
        } else {
            Arc::new(RecorderFindxMetrics::new(name))
        };
        match FindxPool::start(name, &keyspace.find_x, client.clone(), APP_NAME, metrics) {
            Ok(pool) => {
                info!(keyspace = %name, url = %keyspace.find_x.url, "FindX started");
                pools.insert(name.clone(), pool);
            }
            Err(err) => error!(keyspace = %name, error = %err, "error starting FindX"),
        }
    }
    pools
}

/// Derives the runtime keyspace map from configuration, attaching any
/// started FindX pools.
pub fn build_keyspaces(
    config: &Configuration,
    pools: &HashMap<String, Arc<FindxPool>>,
) -> Result<HashMap<String, Arc<Keyspace>>, ConfigError> {
    let (dm_ttl, accel_dm_ttl) = config.device_mapping.resolved();

    let mut keyspaces = HashMap::with_capacity(config.keyspaces.len());
    for (name, keyspace) in &config.keyspaces {
        let formats = keyspace.resolve(name, config.redis.encryption)?;
        let fallback_ttl = if name == "dma" {
            accel_dm_ttl
        } else if keyspace.kind == KeyspaceKind::Dm {
            dm_ttl
        } else {
            crate::DEFAULT_GLOBAL_TTL
        };
        keyspaces.insert(
            name.clone(),
            Arc::new(Keyspace {
                name: name.clone(),
                kind: keyspace.kind,
                input: formats.input,
                store: formats.store,
                output: formats.output,
                ttl: formats.ttl,
                fallback_ttl,
                findx: pools.get(name).cloned(),
            }),
        );
    }
    Ok(keyspaces)
}

/// Wires every component and serves until the cancellation token fires.
pub async fn run(
    config: Configuration,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.validate()?;
    let config = Arc::new(config);

    let metrics_handle = match install_metrics_recorder() {
        Ok(handle) => Some(handle),
        Err(err) => {
            warn!(error = %err, "metrics recorder unavailable");
            None
        }
    };

    let crypto = new_crypto("AesGcm", &config.redis.encryption_key)?;
    let registry = Arc::new(messages::default_registry());

    let convert_metrics: Arc<dyn ConvertMetrics> = if config.no_metrics {
        Arc::new(NoopConvertMetrics)
    } else {
        Arc::new(RecorderConvertMetrics::new(config.keyspaces.keys()))
    };
    let converter =
        Arc::new(Converter::new(registry, crypto).with_metrics(convert_metrics));

    let store = RedisStore::connect(&config.redis.url(), config.redis.client_config.pool_size)
        .await?;
    info!(url = %config.redis.client_config.addrs[0], "Redis connected");

    let client = config.h_client.build_client(APP_NAME)?;
    let pools = start_findx_pools(&config, &client);
    let keyspaces = build_keyspaces(&config, &pools)?;

    let state = Arc::new(AppState {
        config: config.clone(),
        keyspaces,
        store: Arc::new(store),
        converter,
        metrics: metrics_handle,
    });

    let addr = config.web.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "server is ready to handle requests");

    let shutdown = cancel.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("web server is shut down, closing FindX pools");
    let drain = async {
        for pool in pools.values() {
            pool.close().await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        warn!("FindX pools did not drain before the shutdown deadline");
    }

    Ok(())
}
