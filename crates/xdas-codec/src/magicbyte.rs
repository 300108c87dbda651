//! The 1-byte frame header prepended to every stored payload.
//!
//! Bit layout, MSB to LSB:
//!
//! ```text
//! bit 7     : reserved (always 0)
//! bits 6..5 : encryption
//! bits 4..2 : content-type
//! bits 1..0 : content-encoding
//! ```

use http::header::{HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use http::HeaderMap;

/// Length of the frame header in bytes.
pub const MAGIC_BYTE_LENGTH: usize = 1;

const CONTENT_ENCODING_BITS: u8 = 2;
const CONTENT_ENCODING_MAX: u8 = (1 << CONTENT_ENCODING_BITS) - 1;
const CONTENT_TYPE_BITS: u8 = 3;
const CONTENT_TYPE_MAX: u8 = (1 << CONTENT_TYPE_BITS) - 1;
const CONTENT_TYPE_SHIFT: u8 = CONTENT_ENCODING_BITS;
const ENCRYPTION_BITS: u8 = 2;
const ENCRYPTION_MAX: u8 = (1 << ENCRYPTION_BITS) - 1;
const ENCRYPTION_SHIFT: u8 = CONTENT_ENCODING_BITS + CONTENT_TYPE_BITS;

/// Content-encoding code: uncompressed.
pub const CONTENT_ENCODING_NONE: u8 = 0;
/// Content-encoding code: zstd.
pub const CONTENT_ENCODING_ZSTD: u8 = 1;
/// Content-encoding code: zlib (reserved, unimplemented).
pub const CONTENT_ENCODING_ZLIB: u8 = 2;

/// Content-type code: unknown, served as `application/octet-stream`.
pub const CONTENT_TYPE_UNKNOWN: u8 = 0;
/// Content-type code: `application/json`.
pub const CONTENT_TYPE_JSON: u8 = 1;
/// Content-type code: `application/x-protobuf`.
pub const CONTENT_TYPE_PROTOBUF: u8 = 2;

/// Canonical `Content-Type` text for a content-type code.
#[must_use]
pub fn content_type_text(ctv: u8) -> &'static str {
    match ctv {
        CONTENT_TYPE_JSON => "application/json",
        CONTENT_TYPE_PROTOBUF => "application/x-protobuf",
        _ => "application/octet-stream",
    }
}

/// Canonical `Content-Encoding` text for a content-encoding code.
///
/// Returns `None` for the `none` encoding, which must not emit a header.
#[must_use]
pub fn content_encoding_text(cev: u8) -> Option<&'static str> {
    match cev {
        CONTENT_ENCODING_ZSTD => Some("zstd"),
        CONTENT_ENCODING_ZLIB => Some("zlib"),
        _ => None,
    }
}

fn content_encoding_code(text: &str) -> u8 {
    match text {
        "zstd" => CONTENT_ENCODING_ZSTD,
        "zlib" => CONTENT_ENCODING_ZLIB,
        _ => CONTENT_ENCODING_NONE,
    }
}

fn content_type_code(text: &str) -> u8 {
    match text {
        "application/json" | "json" => CONTENT_TYPE_JSON,
        "application/x-protobuf" | "application/vnd.google.protobuf" | "protobuf" => {
            CONTENT_TYPE_PROTOBUF
        }
        _ => CONTENT_TYPE_UNKNOWN,
    }
}

/// Frame header carrying the content-encoding, content-type and encryption
/// codes of a stored payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MagicByte {
    cev: u8,
    ctv: u8,
    encryption: u8,
}

impl MagicByte {
    /// Creates a header from raw field codes.
    #[must_use]
    pub const fn new(cev: u8, ctv: u8, encryption: u8) -> Self {
        Self {
            cev,
            ctv,
            encryption,
        }
    }

    /// Creates a header from HTTP header text.
    ///
    /// Unrecognised strings degrade to the zero codes; this never fails.
    #[must_use]
    pub fn from_http(content_encoding: &str, content_type: &str, encryption: u8) -> Self {
        Self {
            cev: content_encoding_code(content_encoding),
            ctv: content_type_code(content_type),
            encryption,
        }
    }

    /// Unpacks a header from its wire byte. The reserved bit 7 is dropped.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self {
            cev: byte & CONTENT_ENCODING_MAX,
            ctv: (byte >> CONTENT_TYPE_SHIFT) & CONTENT_TYPE_MAX,
            encryption: (byte >> ENCRYPTION_SHIFT) & ENCRYPTION_MAX,
        }
    }

    /// Packs the header into its wire byte.
    #[must_use]
    pub const fn into_byte(self) -> u8 {
        (self.encryption << ENCRYPTION_SHIFT) | (self.ctv << CONTENT_TYPE_SHIFT) | self.cev
    }

    /// Content-encoding code.
    #[must_use]
    pub const fn cev(self) -> u8 {
        self.cev
    }

    /// Content-type code.
    #[must_use]
    pub const fn ctv(self) -> u8 {
        self.ctv
    }

    /// Encryption code.
    #[must_use]
    pub const fn encryption(self) -> u8 {
        self.encryption
    }

    /// Returns a copy with the given encryption code.
    #[must_use]
    pub const fn with_encryption(self, encryption: u8) -> Self {
        Self { encryption, ..self }
    }

    /// Canonical `Content-Type` text for this header.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        content_type_text(self.ctv)
    }

    /// Canonical `Content-Encoding` text, `None` when uncompressed.
    #[must_use]
    pub fn content_encoding(self) -> Option<&'static str> {
        content_encoding_text(self.cev)
    }

    /// Projects the header onto HTTP response (or multipart part) headers.
    ///
    /// `Content-Type` is always set; `Content-Encoding` only when the
    /// encoding is not `none`.
    pub fn set_content_headers(self, headers: &mut HeaderMap) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type()));
        if let Some(encoding) = self.content_encoding() {
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_identity_over_field_ranges() {
        for cev in 0..=CONTENT_ENCODING_MAX {
            for ctv in 0..=CONTENT_TYPE_MAX {
                for enc in 0..=ENCRYPTION_MAX {
                    let mb = MagicByte::new(cev, ctv, enc);
                    let restored = MagicByte::from_byte(mb.into_byte());
                    assert_eq!(restored, mb);
                }
            }
        }
    }

    #[test]
    fn unpack_pack_drops_reserved_bit() {
        for byte in 0u8..=255 {
            let mb = MagicByte::from_byte(byte);
            assert_eq!(mb.into_byte(), byte & 0x7F);
        }
    }

    #[test]
    fn http_lookup_aliases() {
        let mb = MagicByte::from_http("zstd", "json", 0);
        assert_eq!(mb.cev(), CONTENT_ENCODING_ZSTD);
        assert_eq!(mb.ctv(), CONTENT_TYPE_JSON);

        let mb = MagicByte::from_http("", "application/vnd.google.protobuf", 1);
        assert_eq!(mb.cev(), CONTENT_ENCODING_NONE);
        assert_eq!(mb.ctv(), CONTENT_TYPE_PROTOBUF);
        assert_eq!(mb.encryption(), 1);

        let mb = MagicByte::from_http("protobuf", "protobuf", 0);
        assert_eq!(mb.cev(), CONTENT_ENCODING_NONE);
        assert_eq!(mb.ctv(), CONTENT_TYPE_PROTOBUF);
    }

    #[test]
    fn unknown_strings_degrade_to_zero() {
        let mb = MagicByte::from_http("gzip", "text/html; charset=utf-8", 0);
        assert_eq!(mb.cev(), CONTENT_ENCODING_NONE);
        assert_eq!(mb.ctv(), CONTENT_TYPE_UNKNOWN);
        assert_eq!(mb.content_type(), "application/octet-stream");
    }

    #[test]
    fn header_projection_skips_none_encoding() {
        let mut headers = HeaderMap::new();
        MagicByte::new(CONTENT_ENCODING_NONE, CONTENT_TYPE_JSON, 0)
            .set_content_headers(&mut headers);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert!(headers.get(CONTENT_ENCODING).is_none());
    }

    #[test]
    fn header_projection_sets_encoding() {
        let mut headers = HeaderMap::new();
        MagicByte::new(CONTENT_ENCODING_ZSTD, CONTENT_TYPE_PROTOBUF, 1)
            .set_content_headers(&mut headers);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/x-protobuf");
        assert_eq!(headers.get(CONTENT_ENCODING).unwrap(), "zstd");
    }

    #[test]
    fn unknown_content_type_serves_octet_stream() {
        let mut headers = HeaderMap::new();
        MagicByte::new(0, CONTENT_TYPE_UNKNOWN, 0).set_content_headers(&mut headers);
        assert_eq!(
            headers.get(CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
    }
}
