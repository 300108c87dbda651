//! Shared request-engine state.

use std::collections::HashMap;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use xdas_codec::Converter;
use xdas_store::DataStore;

use crate::config::Configuration;
use crate::keyspace::Keyspace;

/// Everything the handlers need, built once at startup.
pub struct AppState {
    pub config: Arc<Configuration>,
    pub keyspaces: HashMap<String, Arc<Keyspace>>,
    pub store: Arc<dyn DataStore>,
    pub converter: Arc<Converter>,
    /// Render handle for `GET /metrics`; absent in tests.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn keyspace(&self, name: &str) -> Option<&Arc<Keyspace>> {
        self.keyspaces.get(name)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("keyspaces", &self.keyspaces.len())
            .finish_non_exhaustive()
    }
}
