//! Keyspace-aware HTTP data-access gateway in front of a Redis cluster.
//!
//! Clients store and retrieve opaque payloads identified by
//! `(keyspace, id)`. The gateway applies a per-keyspace pipeline of
//! content-type transcoding, compression and authenticated encryption at
//! rest, and may notify an external FindX endpoint when a read misses.

use std::time::Duration;

pub mod config;
pub mod duration;
pub mod error;
pub mod handlers;
pub mod keyspace;
pub mod middleware;
pub mod multipart;
pub mod server;
pub mod state;

pub use config::Configuration;
pub use error::ApiError;
pub use server::{router, run};
pub use state::AppState;

/// Process name, used for the User-Agent of outbound FindX calls and as
/// the `app` metrics label.
pub const APP_NAME: &str = "xdas";

/// Build timestamp injected at compile time, `unknown` otherwise.
pub const BUILD_TIME: &str = match option_env!("XDAS_BUILD_TIME") {
    Some(value) => value,
    None => "unknown",
};

/// Maximum accepted request body size in bytes.
pub const MAX_BODY_SIZE: usize = 1_000_000;

/// TTL applied when neither the request nor the keyspace provides one.
pub const DEFAULT_GLOBAL_TTL: Duration = Duration::from_secs(168 * 60 * 60);

/// Default TTL for device-mapping keyspaces.
pub const DEFAULT_DM_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default TTL for the accelerated device-mapping keyspace.
pub const DEFAULT_ACCEL_DM_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
