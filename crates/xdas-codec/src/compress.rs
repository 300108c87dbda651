//! Stateless zstd facade.
//!
//! `encode_all`/`decode_all` allocate their own contexts, so both
//! directions are safe for concurrent callers. The zlib code is reserved
//! in the frame header but has no implementation; requesting it fails.

use crate::error::CodecError;
use crate::magicbyte::{CONTENT_ENCODING_NONE, CONTENT_ENCODING_ZSTD};

/// Default compression level (zstd level 3).
const COMPRESSION_LEVEL: i32 = 0;

/// Compresses `data` according to the content-encoding code.
pub fn compress(cev: u8, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    match cev {
        CONTENT_ENCODING_NONE => Ok(data.to_vec()),
        CONTENT_ENCODING_ZSTD => Ok(zstd::encode_all(data, COMPRESSION_LEVEL)?),
        other => Err(CodecError::UnknownEncoding(other)),
    }
}

/// Decompresses `data` according to the content-encoding code.
pub fn decompress(cev: u8, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    match cev {
        CONTENT_ENCODING_NONE => Ok(data.to_vec()),
        CONTENT_ENCODING_ZSTD => Ok(zstd::decode_all(data)?),
        other => Err(CodecError::UnknownEncoding(other)),
    }
}
