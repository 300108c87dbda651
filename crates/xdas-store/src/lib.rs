//! Framed Redis adapter.
//!
//! Non-atomic keyspaces store `MagicByte(1 byte) || payload`; atomic
//! keyspaces store raw Redis integers. Keys use the hash-tag form
//! `ks:{ID}` so that same-id keys of different keyspaces land on the same
//! cluster slot, which is what makes multi-keyspace `MGET` possible.

mod error;
mod key;
mod memory;
mod pool;
mod redis_store;
mod traits;

pub use error::StoreError;
pub use key::{redis_key, redis_key_ct};
pub use memory::MemoryStore;
pub use pool::{BufferPool, PooledBuf};
pub use redis_store::RedisStore;
pub use traits::DataStore;
