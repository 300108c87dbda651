//! Redis-backed [`DataStore`].

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use xdas_codec::MagicByte;

use crate::error::StoreError;
use crate::pool::BufferPool;
use crate::traits::{split_frame, DataStore};

/// Framed store on top of a deadpool-managed Redis connection pool.
///
/// Cluster slot routing rides on the hash-tag key format; the pool itself
/// targets the configured endpoint.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    buffers: BufferPool,
}

impl RedisStore {
    /// Builds the pool and verifies the connection with a `PING`.
    pub async fn connect(url: &str, pool_size: usize) -> Result<Self, StoreError> {
        let config = Config::from_url(url);
        let pool = config
            .builder()
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .max_size(pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            buffers: BufferPool::new(),
        })
    }

    async fn conn(&self) -> Result<Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

#[async_trait]
impl DataStore for RedisStore {
    async fn raw_get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        conn.get(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn framed_get(&self, key: &str) -> Result<Option<(MagicByte, Vec<u8>)>, StoreError> {
        match self.raw_get(key).await? {
            Some(value) => split_frame(value).map(Some),
            None => Ok(None),
        }
    }

    async fn framed_set(
        &self,
        key: &str,
        mb: MagicByte,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut buf = self.buffers.acquire();
        buf.reserve(1 + payload.len());
        buf.push(mb.into_byte());
        buf.extend_from_slice(payload);

        let mut conn = self.conn().await?;
        if ttl.is_zero() {
            conn.set::<_, _, ()>(key, buf.as_slice())
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        } else {
            conn.set_ex::<_, _, ()>(key, buf.as_slice(), ttl.as_secs().max(1))
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn framed_mget(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<(MagicByte, Vec<u8>)>>, StoreError> {
        let mut conn = self.conn().await?;
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let parsed = values
            .into_iter()
            .zip(keys)
            .map(|(value, key)| match value {
                Some(raw) => match split_frame(raw) {
                    Ok(frame) => Some(frame),
                    Err(err) => {
                        tracing::warn!(key = %key, error = %err, "skipping malformed stored value");
                        None
                    }
                },
                None => None,
            })
            .collect();
        Ok(parsed)
    }

    async fn delete(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        conn.del(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        conn.exists(key)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn incr_by(&self, key: &str, n: i64, ttl: Duration) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        let (value, _expired): (i64, i64) = redis::pipe()
            .cmd("INCRBY")
            .arg(key)
            .arg(n)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .query_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(value)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdas_codec::CONTENT_TYPE_JSON;

    // Integration tests require a running Redis instance.
    // Run with: cargo test -- --ignored

    #[tokio::test]
    #[ignore = "requires Redis instance at 127.0.0.1:6379"]
    async fn framed_roundtrip() {
        let store = RedisStore::connect("redis://127.0.0.1:6379", 4)
            .await
            .expect("connect");
        let mb = MagicByte::new(0, CONTENT_TYPE_JSON, 0);

        store
            .framed_set("test:{RT}", mb, br#"{"a":1}"#, Duration::from_secs(30))
            .await
            .unwrap();
        let (got_mb, payload) = store.framed_get("test:{RT}").await.unwrap().unwrap();
        assert_eq!(got_mb, mb);
        assert_eq!(payload, br#"{"a":1}"#);

        assert_eq!(store.delete("test:{RT}").await.unwrap(), 1);
        assert!(store.framed_get("test:{RT}").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires Redis instance at 127.0.0.1:6379"]
    async fn incr_refreshes_ttl() {
        let store = RedisStore::connect("redis://127.0.0.1:6379", 4)
            .await
            .expect("connect");
        let _ = store.delete("test:{INC}").await;

        let v1 = store
            .incr_by("test:{INC}", 3, Duration::from_secs(60))
            .await
            .unwrap();
        let v2 = store
            .incr_by("test:{INC}", 1, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(v1, 3);
        assert_eq!(v2, 4);
        let _ = store.delete("test:{INC}").await;
    }
}
