//! Minimal `multipart/mixed` response writer.
//!
//! Parts carry their own headers (`Content-Type`, `Content-Encoding`,
//! `Namespace`). The boundary is a random token and must be echoed in
//! the response `Content-Type`.

use axum::http::HeaderMap;
use uuid::Uuid;

/// Buffered multipart writer.
pub struct MultipartWriter {
    boundary: String,
    buf: Vec<u8>,
    parts: usize,
}

impl MultipartWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boundary: Uuid::new_v4().simple().to_string(),
            buf: Vec::new(),
            parts: 0,
        }
    }

    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the response `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary)
    }

    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts
    }

    /// Appends one part with its headers and body.
    pub fn part(&mut self, headers: &HeaderMap, body: &[u8]) {
        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        for (name, value) in headers {
            self.buf
                .extend_from_slice(canonical_name(name.as_str()).as_bytes());
            self.buf.extend_from_slice(b": ");
            self.buf.extend_from_slice(value.as_bytes());
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(body);
        self.parts += 1;
    }

    /// Appends the closing boundary and returns the body.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(b"\r\n--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"--\r\n");
        self.buf
    }
}

impl Default for MultipartWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// `content-type` -> `Content-Type`.
fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for segment in name.split('-') {
        if !out.is_empty() {
            out.push('-');
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}
