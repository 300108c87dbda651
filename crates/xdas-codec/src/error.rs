use thiserror::Error;

/// Errors raised by the framing, transcoding and crypto layers.
#[derive(Debug, Error)]
pub enum CodecError {
    /// No message codec registered for the keyspace.
    #[error("unknown keyspace definition")]
    UnknownKeyspace,

    /// Content-encoding code with no implemented codec (includes the
    /// reserved zlib code).
    #[error("unknown encoding type {0}")]
    UnknownEncoding(u8),

    /// Content-type code that cannot be marshalled.
    #[error("unknown content-type {0}")]
    UnknownContentType(u8),

    /// Encryption code with no configured backend.
    #[error("unknown encryption type {0}")]
    UnknownEncryption(u8),

    /// Malformed encryption key material.
    #[error("invalid encryption key: {0}")]
    InvalidKey(String),

    /// Ciphertext shorter than the AEAD overhead or failing the tag check.
    #[error("not valid AES-GCM encrypted data")]
    InvalidCiphertext,

    /// AEAD sealing failure.
    #[error("encryption failure")]
    EncryptFailure,

    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),

    #[error("protobuf decode error: {0}")]
    ProtoDecode(#[from] prost::DecodeError),

    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}
