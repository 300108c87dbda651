//! TTL grammar shared by the `Xttl` header and keyspace configuration.
//!
//! A bare integer is seconds; otherwise an integer followed by a single
//! unit of `ns`, `us` (or `µs`), `ms`, `s`, `m`, `h`.

use std::time::Duration;

/// Parses a duration string.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_owned());
    }
    if let Ok(seconds) = input.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    // Longest suffix first so "ms" is not read as "s".
    const UNITS: [(&str, u64); 7] = [
        ("ns", 1),
        ("µs", 1_000),
        ("us", 1_000),
        ("ms", 1_000_000),
        ("s", 1_000_000_000),
        ("m", 60 * 1_000_000_000),
        ("h", 3_600 * 1_000_000_000),
    ];
    for (suffix, nanos_per_unit) in UNITS {
        if let Some(number) = input.strip_suffix(suffix) {
            let value: u64 = number
                .trim()
                .parse()
                .map_err(|_| format!("invalid duration: {input}"))?;
            return value
                .checked_mul(nanos_per_unit)
                .map(Duration::from_nanos)
                .ok_or_else(|| format!("duration overflow: {input}"));
        }
    }
    Err(format!("invalid duration: {input}"))
}

/// Resolves the TTL for a write.
///
/// An `Xttl` header wins when it parses; otherwise the keyspace TTL when
/// positive; otherwise the supplied fallback.
pub fn resolve_ttl(header: Option<&str>, keyspace_ttl: Duration, fallback: Duration) -> Duration {
    if let Some(raw) = header {
        if !raw.is_empty() {
            if let Ok(ttl) = parse_duration(raw) {
                return ttl;
            }
        }
    }
    if keyspace_ttl > Duration::ZERO {
        keyspace_ttl
    } else {
        fallback
    }
}
