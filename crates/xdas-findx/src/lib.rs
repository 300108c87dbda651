//! Asynchronous cache-miss backfill.
//!
//! When a GET misses, the gateway notifies an external FindX endpoint so
//! it can replenish the key upstream. The notification path must never
//! block a client request: ids go into a bounded queue with a
//! non-blocking enqueue that drops on overflow, and a fixed set of worker
//! tasks drains the queue into outbound HTTP calls.

mod error;
mod metrics;
mod pool;

pub use error::FindxError;
pub use metrics::{FindxMetrics, NoopFindxMetrics, RecorderFindxMetrics};
pub use pool::{FindxConfig, FindxPool, DEFAULT_BUFFER_SIZE, DEFAULT_THREAD_COUNT};
