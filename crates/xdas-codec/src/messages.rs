//! Message types stored by the well-known keyspaces.
//!
//! Field tags are part of the stored format; never renumber them. JSON
//! field names are camelCase to match the protobuf-JSON mapping.

use serde::{Deserialize, Serialize};

use crate::registry::MessageRegistry;

/// Account profile record (`pa` keyspace).
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountProfile {
    #[prost(string, tag = "1")]
    pub account_id: String,
    #[prost(string, tag = "2")]
    pub partner: String,
    #[prost(string, repeated, tag = "3")]
    pub features: Vec<String>,
    #[prost(int64, tag = "4")]
    pub updated_at: i64,
}

/// Protection payload record (`pld` keyspace).
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtectionPayload {
    #[prost(string, tag = "1")]
    pub account_id: String,
    #[prost(bytes = "vec", tag = "2")]
    pub blob: Vec<u8>,
    #[prost(int64, tag = "3")]
    pub revision: i64,
}

/// Device mapping record (`dm` keyspace).
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceMapping {
    #[prost(string, tag = "1")]
    pub primary_id: String,
    #[prost(string, repeated, tag = "2")]
    pub devices: Vec<String>,
    #[prost(int64, tag = "3")]
    pub mapped_at: i64,
}

/// Time-sharded threat notification (`ct` keyspace).
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThreatNotification {
    #[prost(string, tag = "1")]
    pub device_id: String,
    #[prost(string, tag = "2")]
    pub threat_type: String,
    #[prost(string, tag = "3")]
    pub url: String,
    #[prost(int64, tag = "4")]
    pub observed_at: i64,
}

/// Global settings record (`gs` keyspace).
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalSettings {
    #[prost(string, tag = "1")]
    pub profile: String,
    #[prost(map = "string, string", tag = "2")]
    pub values: std::collections::HashMap<String, String>,
}

/// Registry wired with the well-known keyspaces.
#[must_use]
pub fn default_registry() -> MessageRegistry {
    let mut registry = MessageRegistry::new();
    registry.register::<AccountProfile>("pa");
    registry.register::<ProtectionPayload>("pld");
    registry.register::<DeviceMapping>("dm");
    registry.register::<ThreatNotification>("ct");
    registry.register::<GlobalSettings>("gs");
    registry
}
