//! Payload framing, transcoding and encryption-at-rest for the xdas gateway.
//!
//! Every non-atomic value stored in Redis is framed as
//! `MagicByte(1 byte) || payload`. This crate owns the frame header codec,
//! the zstd compression facade, the AES-256-GCM crypto backend and the
//! conversion pipeline that transcodes payloads between the input, stored
//! and output framings of a keyspace.

mod compress;
mod convert;
mod crypto;
mod error;
mod magicbyte;
mod metrics;
mod registry;

pub mod messages;

pub use compress::{compress, decompress};
pub use convert::Converter;
pub use crypto::{new_crypto, AesGcmCrypto, Crypto, NONCE_SIZE, OVERHEAD, TAG_SIZE};
pub use error::CodecError;
pub use magicbyte::{
    content_encoding_text, content_type_text, MagicByte, CONTENT_ENCODING_NONE,
    CONTENT_ENCODING_ZLIB, CONTENT_ENCODING_ZSTD, CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF,
    CONTENT_TYPE_UNKNOWN, MAGIC_BYTE_LENGTH,
};
pub use metrics::{ConvertMetrics, NoopConvertMetrics, RecorderConvertMetrics};
pub use registry::{MessageCodec, MessageRegistry, ProstCodec};
