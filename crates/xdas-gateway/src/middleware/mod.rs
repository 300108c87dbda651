//! Gateway middleware.

pub mod admission;
pub mod metrics;
pub mod weblog;

pub use admission::admission_guard;
pub use metrics::ApiMetricsLayer;
pub use weblog::log_requests;
