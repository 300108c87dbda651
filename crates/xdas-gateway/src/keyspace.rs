//! Resolved keyspace runtime configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use xdas_codec::MagicByte;
use xdas_findx::FindxPool;

/// Storage flavour of a keyspace.
///
/// `atomic` keyspaces store raw Redis integers with no frame header;
/// `hashes` is representable in configuration but used by no handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyspaceKind {
    #[default]
    String,
    Dm,
    Atomic,
    Hashes,
}

impl fmt::Display for KeyspaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::String => "string",
            Self::Dm => "dm",
            Self::Atomic => "atomic",
            Self::Hashes => "hashes",
        };
        f.write_str(text)
    }
}

/// A keyspace with its derived frame headers, TTLs and FindX pool.
/// Built once at startup, immutable afterwards.
pub struct Keyspace {
    pub name: String,
    pub kind: KeyspaceKind,
    /// Accepted inbound framing; zero fields accept anything.
    pub input: MagicByte,
    /// Framing written to Redis, carrying the process-wide encryption bit.
    pub store: MagicByte,
    /// Default framing served on GET.
    pub output: MagicByte,
    /// TTL from configuration; zero means fall back on write.
    pub ttl: Duration,
    /// TTL used when neither the request nor `ttl` provides one.
    pub fallback_ttl: Duration,
    pub findx: Option<Arc<FindxPool>>,
}

impl fmt::Debug for Keyspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keyspace")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("ttl", &self.ttl)
            .field("findx", &self.findx.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_lowercase() {
        let kind: KeyspaceKind = serde_json::from_str("\"atomic\"").unwrap();
        assert_eq!(kind, KeyspaceKind::Atomic);
        let kind: KeyspaceKind = serde_json::from_str("\"dm\"").unwrap();
        assert_eq!(kind, KeyspaceKind::Dm);
        assert!(serde_json::from_str::<KeyspaceKind>("\"counter\"").is_err());
    }

    #[test]
    fn kind_display() {
        assert_eq!(KeyspaceKind::String.to_string(), "string");
        assert_eq!(KeyspaceKind::Hashes.to_string(), "hashes");
    }
}
