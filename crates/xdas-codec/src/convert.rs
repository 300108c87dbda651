//! The conversion pipeline.
//!
//! Transcodes a payload from one frame header to another. Dispatch is
//! ordered: a content-type change implies a full unpack/repack, an
//! encoding change re-compresses, an encryption change re-seals, and an
//! identical header passes through untouched. Each step fails fast; on
//! failure the caller still holds the borrowed input and may serve it.

use std::sync::Arc;

use crate::compress::{compress, decompress};
use crate::crypto::Crypto;
use crate::error::CodecError;
use crate::magicbyte::MagicByte;
use crate::metrics::{ConvertMetrics, NoopConvertMetrics};
use crate::registry::MessageRegistry;

/// Transcoding engine shared by all request handlers.
pub struct Converter {
    registry: Arc<MessageRegistry>,
    crypto: Arc<dyn Crypto>,
    metrics: Arc<dyn ConvertMetrics>,
}

impl Converter {
    pub fn new(registry: Arc<MessageRegistry>, crypto: Arc<dyn Crypto>) -> Self {
        Self {
            registry,
            crypto,
            metrics: Arc::new(NoopConvertMetrics),
        }
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn ConvertMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Converts `data` from the `input` framing to the `output` framing.
    ///
    /// An output header with content-type 0 inherits the input's
    /// content-type; the caller only asked for an encoding or encryption
    /// change.
    pub fn convert(
        &self,
        keyspace: &str,
        input: MagicByte,
        output: MagicByte,
        data: &[u8],
    ) -> Result<(MagicByte, Vec<u8>), CodecError> {
        let output = if output.ctv() == 0 {
            MagicByte::new(output.cev(), input.ctv(), output.encryption())
        } else {
            output
        };

        if input.ctv() != output.ctv() && output.ctv() != 0 {
            let result = self.repack(keyspace, input, output, data);
            match &result {
                Ok(_) => self.metrics.content_type_suc(keyspace),
                Err(_) => self.metrics.content_type_fail(keyspace),
            }
            return result.map(|converted| (output, converted));
        }

        if input.cev() != output.cev() {
            let result = self.recompress(input, output, data);
            match &result {
                Ok(_) => self.metrics.content_encoding_suc(keyspace),
                Err(_) => self.metrics.content_encoding_fail(keyspace),
            }
            return result.map(|converted| (output, converted));
        }

        if input.encryption() != output.encryption() {
            let result = self
                .decrypt(input.encryption(), data)
                .and_then(|plain| self.encrypt(output.encryption(), &plain));
            match &result {
                Ok(_) => self.metrics.encryption_suc(keyspace),
                Err(_) => self.metrics.encryption_fail(keyspace),
            }
            return result.map(|converted| (output, converted));
        }

        Ok((input, data.to_vec()))
    }

    /// Validates that `data` unpacks as the keyspace's message under the
    /// `input` framing: decrypt, decompress, unmarshal.
    pub fn unpack(&self, keyspace: &str, input: MagicByte, data: &[u8]) -> Result<(), CodecError> {
        let codec = self
            .registry
            .get(keyspace)
            .ok_or(CodecError::UnknownKeyspace)?;
        let plain = self.decrypt(input.encryption(), data)?;
        let raw = decompress(input.cev(), &plain)?;
        codec.validate(input.ctv(), &raw)
    }

    fn repack(
        &self,
        keyspace: &str,
        input: MagicByte,
        output: MagicByte,
        data: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        let codec = self
            .registry
            .get(keyspace)
            .ok_or(CodecError::UnknownKeyspace)?;
        let plain = self.decrypt(input.encryption(), data)?;
        let raw = decompress(input.cev(), &plain)?;
        let remarshalled = codec.transcode(input.ctv(), output.ctv(), &raw)?;
        let packed = compress(output.cev(), &remarshalled)?;
        self.encrypt(output.encryption(), &packed)
    }

    fn recompress(
        &self,
        input: MagicByte,
        output: MagicByte,
        data: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        let plain = self.decrypt(input.encryption(), data)?;
        let raw = decompress(input.cev(), &plain)?;
        let packed = compress(output.cev(), &raw)?;
        self.encrypt(output.encryption(), &packed)
    }

    fn decrypt(&self, encryption: u8, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match encryption {
            0 => Ok(data.to_vec()),
            1 => self.crypto.decrypt(data),
            other => Err(CodecError::UnknownEncryption(other)),
        }
    }

    fn encrypt(&self, encryption: u8, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match encryption {
            0 => Ok(data.to_vec()),
            1 => self.crypto.encrypt(data),
            other => Err(CodecError::UnknownEncryption(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AesGcmCrypto;
    use crate::magicbyte::{
        CONTENT_ENCODING_NONE, CONTENT_ENCODING_ZSTD, CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF,
        CONTENT_TYPE_UNKNOWN,
    };
    use crate::messages::AccountProfile;
    use prost::Message;
    use std::sync::atomic::{AtomicU64, Ordering};

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[derive(Default)]
    struct CountingMetrics {
        ce_suc: AtomicU64,
        ce_fail: AtomicU64,
        ct_suc: AtomicU64,
        ct_fail: AtomicU64,
        en_suc: AtomicU64,
        en_fail: AtomicU64,
    }

    impl ConvertMetrics for CountingMetrics {
        fn content_encoding_suc(&self, _: &str) {
            self.ce_suc.fetch_add(1, Ordering::Relaxed);
        }
        fn content_encoding_fail(&self, _: &str) {
            self.ce_fail.fetch_add(1, Ordering::Relaxed);
        }
        fn content_type_suc(&self, _: &str) {
            self.ct_suc.fetch_add(1, Ordering::Relaxed);
        }
        fn content_type_fail(&self, _: &str) {
            self.ct_fail.fetch_add(1, Ordering::Relaxed);
        }
        fn encryption_suc(&self, _: &str) {
            self.en_suc.fetch_add(1, Ordering::Relaxed);
        }
        fn encryption_fail(&self, _: &str) {
            self.en_fail.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn converter() -> (Converter, Arc<CountingMetrics>) {
        let mut registry = MessageRegistry::new();
        registry.register::<AccountProfile>("pa");
        let crypto = Arc::new(AesGcmCrypto::new(&[TEST_KEY.to_owned()]).unwrap());
        let metrics = Arc::new(CountingMetrics::default());
        let converter =
            Converter::new(Arc::new(registry), crypto).with_metrics(metrics.clone());
        (converter, metrics)
    }

    fn sample_proto() -> Vec<u8> {
        AccountProfile {
            account_id: "A42".to_owned(),
            partner: "west".to_owned(),
            features: vec!["dns".to_owned()],
            updated_at: 99,
        }
        .encode_to_vec()
    }

    #[test]
    fn identical_framing_is_passthrough() {
        let (converter, metrics) = converter();
        let mb = MagicByte::new(CONTENT_ENCODING_ZSTD, CONTENT_TYPE_PROTOBUF, 1);
        let data = b"opaque bytes, not inspected".to_vec();

        let (out_mb, out) = converter.convert("pa", mb, mb, &data).unwrap();
        assert_eq!(out_mb, mb);
        assert_eq!(out, data);
        assert_eq!(metrics.ct_suc.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.ce_suc.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.en_suc.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn content_type_change_roundtrip() {
        let (converter, metrics) = converter();
        let proto_mb = MagicByte::new(CONTENT_ENCODING_NONE, CONTENT_TYPE_PROTOBUF, 0);
        let json_mb = MagicByte::new(CONTENT_ENCODING_ZSTD, CONTENT_TYPE_JSON, 1);
        let proto = sample_proto();

        let (mb, json) = converter.convert("pa", proto_mb, json_mb, &proto).unwrap();
        assert_eq!(mb, json_mb);

        let (mb, back) = converter.convert("pa", json_mb, proto_mb, &json).unwrap();
        assert_eq!(mb, proto_mb);
        assert_eq!(back, proto);
        assert_eq!(metrics.ct_suc.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn encoding_change_roundtrip() {
        let (converter, _) = converter();
        let plain = MagicByte::new(CONTENT_ENCODING_NONE, CONTENT_TYPE_PROTOBUF, 0);
        let packed = MagicByte::new(CONTENT_ENCODING_ZSTD, CONTENT_TYPE_PROTOBUF, 1);
        let data = sample_proto();

        let (_, stored) = converter.convert("pa", plain, packed, &data).unwrap();
        assert_ne!(stored, data);
        let (_, restored) = converter.convert("pa", packed, plain, &stored).unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn encryption_change_only() {
        let (converter, metrics) = converter();
        let open = MagicByte::new(CONTENT_ENCODING_NONE, CONTENT_TYPE_UNKNOWN, 0);
        let sealed = open.with_encryption(1);
        let data = b"raw payload".to_vec();

        let (mb, stored) = converter.convert("pa", open, sealed, &data).unwrap();
        assert_eq!(mb, sealed);
        assert_eq!(stored.len(), data.len() + crate::crypto::OVERHEAD);

        let (_, restored) = converter.convert("pa", sealed, open, &stored).unwrap();
        assert_eq!(restored, data);
        assert_eq!(metrics.en_suc.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn output_content_type_inherits_input() {
        let (converter, _) = converter();
        let input = MagicByte::new(CONTENT_ENCODING_NONE, CONTENT_TYPE_JSON, 0);
        let output = MagicByte::new(CONTENT_ENCODING_ZSTD, 0, 0);
        let data = br#"{"accountId":"A1"}"#;

        let (mb, _) = converter.convert("pa", input, output, data).unwrap();
        assert_eq!(mb.ctv(), CONTENT_TYPE_JSON);
        assert_eq!(mb.cev(), CONTENT_ENCODING_ZSTD);
    }

    #[test]
    fn content_type_change_requires_registration() {
        let (converter, metrics) = converter();
        let proto_mb = MagicByte::new(CONTENT_ENCODING_NONE, CONTENT_TYPE_PROTOBUF, 0);
        let json_mb = MagicByte::new(CONTENT_ENCODING_NONE, CONTENT_TYPE_JSON, 0);

        let err = converter
            .convert("nope", proto_mb, json_mb, &sample_proto())
            .unwrap_err();
        assert!(matches!(err, CodecError::UnknownKeyspace));
        assert_eq!(metrics.ct_fail.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn failed_branch_increments_fail_counter() {
        let (converter, metrics) = converter();
        let packed = MagicByte::new(CONTENT_ENCODING_ZSTD, CONTENT_TYPE_PROTOBUF, 0);
        let plain = MagicByte::new(CONTENT_ENCODING_NONE, CONTENT_TYPE_PROTOBUF, 0);

        // Not a zstd frame, so the decompress step fails.
        assert!(converter.convert("pa", packed, plain, b"junk").is_err());
        assert_eq!(metrics.ce_fail.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.ce_suc.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn unpack_validates_full_pipeline() {
        let (converter, _) = converter();
        let stored = MagicByte::new(CONTENT_ENCODING_ZSTD, CONTENT_TYPE_PROTOBUF, 1);
        let plain_mb = MagicByte::new(CONTENT_ENCODING_NONE, CONTENT_TYPE_PROTOBUF, 0);

        let (_, sealed) = converter
            .convert("pa", plain_mb, stored, &sample_proto())
            .unwrap();
        assert!(converter.unpack("pa", stored, &sealed).is_ok());
        assert!(converter.unpack("pa", stored, b"garbage").is_err());
        assert!(matches!(
            converter.unpack("nope", stored, &sealed),
            Err(CodecError::UnknownKeyspace)
        ));
    }
}
