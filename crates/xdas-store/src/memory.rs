//! In-memory [`DataStore`] for tests and local development.
//!
//! Mirrors the framed Redis semantics, including TTL expiry and raw
//! integer storage for atomic keys. `fail_all` injects backend errors so
//! error paths can be exercised deterministically.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use xdas_codec::MagicByte;

use crate::error::StoreError;
use crate::traits::{split_frame, DataStore};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, Entry>>>,
    fail_all: Arc<AtomicBool>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with a backend error.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::Release);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_all.load(Ordering::Acquire) {
            return Err(StoreError::Backend("injected failure".to_owned()));
        }
        Ok(())
    }

    /// Remaining TTL of a key, for test assertions.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let data = self.data.read().await;
        data.get(key)
            .filter(|e| e.live())
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    async fn insert(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        let mut data = self.data.write().await;
        data.insert(key.to_owned(), Entry { value, expires_at });
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn raw_get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data
            .get(key)
            .filter(|e| e.live())
            .map(|e| e.value.clone()))
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
        self.check()?;
        let mut value = Vec::with_capacity(1 + payload.len());
        value.push(mb.into_byte());
        value.extend_from_slice(payload);
        self.insert(key, value, ttl).await;
        Ok(())
    }

    async fn framed_mget(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<(MagicByte, Vec<u8>)>>, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(keys
            .iter()
            .map(|key| {
                data.get(key)
                    .filter(|e| e.live())
                    .and_then(|e| split_frame(e.value.clone()).ok())
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<i64, StoreError> {
        self.check()?;
        let mut data = self.data.write().await;
        Ok(i64::from(data.remove(key).is_some()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        let data = self.data.read().await;
        Ok(data.get(key).is_some_and(Entry::live))
    }

    async fn incr_by(&self, key: &str, n: i64, ttl: Duration) -> Result<i64, StoreError> {
        self.check()?;
        let mut data = self.data.write().await;
        let current = data
            .get(key)
            .filter(|e| e.live())
            .and_then(|e| std::str::from_utf8(&e.value).ok())
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);
        let value = current + n;
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        data.insert(
            key.to_owned(),
            Entry {
                value: value.to_string().into_bytes(),
                expires_at,
            },
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdas_codec::{CONTENT_ENCODING_ZSTD, CONTENT_TYPE_PROTOBUF};

    #[tokio::test]
    async fn framed_roundtrip() {
        let store = MemoryStore::new();
        let mb = MagicByte::new(CONTENT_ENCODING_ZSTD, CONTENT_TYPE_PROTOBUF, 1);

        store
            .framed_set("pa:{A}", mb, b"payload", Duration::from_secs(60))
            .await
            .unwrap();
        let (got, payload) = store.framed_get("pa:{A}").await.unwrap().unwrap();
        assert_eq!(got, mb);
        assert_eq!(payload, b"payload");
    }

    #[tokio::test]
    async fn zero_ttl_lives_forever() {
        let store = MemoryStore::new();
        store
            .framed_set("pa:{A}", MagicByte::default(), b"x", Duration::ZERO)
            .await
            .unwrap();
        assert!(store.ttl("pa:{A}").await.is_none());
        assert!(store.exists("pa:{A}").await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let store = MemoryStore::new();
        store
            .framed_set("pa:{A}", MagicByte::default(), b"x", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.framed_get("pa:{A}").await.unwrap().is_none());
        assert!(!store.exists("pa:{A}").await.unwrap());
    }

    #[tokio::test]
    async fn mget_preserves_order_and_misses() {
        let store = MemoryStore::new();
        let mb = MagicByte::default();
        store
            .framed_set("a:{X}", mb, b"1", Duration::ZERO)
            .await
            .unwrap();
        store
            .framed_set("c:{X}", mb, b"3", Duration::ZERO)
            .await
            .unwrap();

        let keys = vec!["a:{X}".to_owned(), "b:{X}".to_owned(), "c:{X}".to_owned()];
        let results = store.framed_mget(&keys).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().1, b"1");
        assert!(results[1].is_none());
        assert_eq!(results[2].as_ref().unwrap().1, b"3");
    }

    #[tokio::test]
    async fn incr_starts_at_zero_and_refreshes_ttl() {
        let store = MemoryStore::new();
        assert_eq!(
            store
                .incr_by("c1:{A}", 3, Duration::from_secs(10))
                .await
                .unwrap(),
            3
        );
        assert_eq!(
            store
                .incr_by("c1:{A}", 1, Duration::from_secs(60))
                .await
                .unwrap(),
            4
        );
        let ttl = store.ttl("c1:{A}").await.unwrap();
        assert!(ttl > Duration::from_secs(10));

        let raw = store.raw_get("c1:{A}").await.unwrap().unwrap();
        assert_eq!(raw, b"4");
    }

    #[tokio::test]
    async fn delete_counts_rows() {
        let store = MemoryStore::new();
        store
            .framed_set("pa:{A}", MagicByte::default(), b"x", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(store.delete("pa:{A}").await.unwrap(), 1);
        assert_eq!(store.delete("pa:{A}").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fault_injection() {
        let store = MemoryStore::new();
        store.fail_all(true);
        assert!(store.raw_get("pa:{A}").await.is_err());
        assert!(store
            .framed_set("pa:{A}", MagicByte::default(), b"x", Duration::ZERO)
            .await
            .is_err());
        store.fail_all(false);
        assert!(store.raw_get("pa:{A}").await.unwrap().is_none());
    }
}
