use std::time::Duration;

use async_trait::async_trait;
use xdas_codec::MagicByte;

use crate::error::StoreError;

/// Storage operations the request engine depends on.
///
/// `Ok(None)` is a miss; errors are backend failures. A TTL of zero means
/// the value lives forever.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// `GET` without frame parsing, for atomic keyspaces.
    async fn raw_get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// `GET` splitting the magic byte from the payload.
    async fn framed_get(&self, key: &str) -> Result<Option<(MagicByte, Vec<u8>)>, StoreError>;

    /// `SET key (mb || payload) EX ttl`.
    async fn framed_set(
        &self,
        key: &str,
        mb: MagicByte,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// One `MGET` round-trip with per-element frame parsing.
    /// Length-short elements are skipped and surfaced as misses.
    async fn framed_mget(
        &self,
        keys: &[String],
    ) -> Result<Vec<Option<(MagicByte, Vec<u8>)>>, StoreError>;

    /// `DEL`, returning the number of removed keys.
    async fn delete(&self, key: &str) -> Result<i64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// `INCRBY` + `EXPIRE` pipelined in one round-trip; returns the new
    /// counter value.
    async fn incr_by(&self, key: &str, n: i64, ttl: Duration) -> Result<i64, StoreError>;
}

/// Splits a stored value into its frame header and payload.
pub(crate) fn split_frame(value: Vec<u8>) -> Result<(MagicByte, Vec<u8>), StoreError> {
    if value.is_empty() {
        return Err(StoreError::MissingMagicByte);
    }
    let mut head = value;
    let payload = head.split_off(1);
    Ok((MagicByte::from_byte(head[0]), payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_frame_shapes() {
        let (mb, payload) = split_frame(vec![0b0010_0110, b'h', b'i']).unwrap();
        assert_eq!(mb.into_byte(), 0b0010_0110);
        assert_eq!(payload, b"hi");

        let (mb, payload) = split_frame(vec![0]).unwrap();
        assert_eq!(mb, MagicByte::default());
        assert!(payload.is_empty());

        assert!(matches!(
            split_frame(Vec::new()),
            Err(StoreError::MissingMagicByte)
        ));
    }
}
