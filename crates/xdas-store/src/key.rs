//! Redis key shaping.
//!
//! The `{id}` hash tag routes every same-id key to the same cluster slot.
//! Id casing is normalised at the HTTP layer, not here.

/// Key for a plain keyspace: `ks:{id}`.
#[must_use]
pub fn redis_key(keyspace: &str, id: &str) -> String {
    format!("{keyspace}:{{{id}}}")
}

/// Key for the time-sharded `ct` keyspace: `ks:{id}_<epochHour>_<quarter>`.
#[must_use]
pub fn redis_key_ct(keyspace: &str, id: &str, epoch_hour: &str, quarter: &str) -> String {
    format!("{keyspace}:{{{id}}}_{epoch_hour}_{quarter}")
}
