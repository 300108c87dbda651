//! Conversion outcome counters.
//!
//! The converter is polymorphic over this capability set so that tests and
//! benchmarks run without a metrics recorder. The recorder-backed variant
//! pre-registers one counter handle per keyspace and outcome, keeping the
//! hot path at a read-only map lookup plus an atomic add.

use std::collections::HashMap;

use metrics::{counter, Counter};

/// Capability seam for conversion metrics.
pub trait ConvertMetrics: Send + Sync {
    fn content_encoding_suc(&self, keyspace: &str);
    fn content_encoding_fail(&self, keyspace: &str);
    fn content_type_suc(&self, keyspace: &str);
    fn content_type_fail(&self, keyspace: &str);
    fn encryption_suc(&self, keyspace: &str);
    fn encryption_fail(&self, keyspace: &str);
}

/// Default provider; drops everything.
pub struct NoopConvertMetrics;

impl ConvertMetrics for NoopConvertMetrics {
    fn content_encoding_suc(&self, _keyspace: &str) {}
    fn content_encoding_fail(&self, _keyspace: &str) {}
    fn content_type_suc(&self, _keyspace: &str) {}
    fn content_type_fail(&self, _keyspace: &str) {}
    fn encryption_suc(&self, _keyspace: &str) {}
    fn encryption_fail(&self, _keyspace: &str) {}
}

struct KeyspaceCounters {
    ce_suc: Counter,
    ce_fail: Counter,
    ct_suc: Counter,
    ct_fail: Counter,
    en_suc: Counter,
    en_fail: Counter,
}

impl KeyspaceCounters {
    fn register(keyspace: &str) -> Self {
        let labelled = |name: &'static str, code: &'static str| {
            counter!(name, "keyspace" => keyspace.to_owned(), "code" => code)
        };
        Self {
            ce_suc: labelled("xdas_convert_ce", "suc"),
            ce_fail: labelled("xdas_convert_ce", "fail"),
            ct_suc: labelled("xdas_convert_ct", "suc"),
            ct_fail: labelled("xdas_convert_ct", "fail"),
            en_suc: labelled("xdas_convert_en", "suc"),
            en_fail: labelled("xdas_convert_en", "fail"),
        }
    }
}

/// Counters registered with the installed metrics recorder.
pub struct RecorderConvertMetrics {
    counters: HashMap<String, KeyspaceCounters>,
    unknown: KeyspaceCounters,
}

impl RecorderConvertMetrics {
    /// Pre-registers counters for the configured keyspaces. Increments for
    /// unlisted keyspaces land on an `unknown` series.
    #[must_use]
    pub fn new<I, S>(keyspaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let counters = keyspaces
            .into_iter()
            .map(|ks| {
                let name = ks.as_ref().to_owned();
                let registered = KeyspaceCounters::register(&name);
                (name, registered)
            })
            .collect();
        Self {
            counters,
            unknown: KeyspaceCounters::register("unknown"),
        }
    }

    fn slot(&self, keyspace: &str) -> &KeyspaceCounters {
        self.counters.get(keyspace).unwrap_or(&self.unknown)
    }
}

impl ConvertMetrics for RecorderConvertMetrics {
    fn content_encoding_suc(&self, keyspace: &str) {
        self.slot(keyspace).ce_suc.increment(1);
    }

    fn content_encoding_fail(&self, keyspace: &str) {
        self.slot(keyspace).ce_fail.increment(1);
    }

    fn content_type_suc(&self, keyspace: &str) {
        self.slot(keyspace).ct_suc.increment(1);
    }

    fn content_type_fail(&self, keyspace: &str) {
        self.slot(keyspace).ct_fail.increment(1);
    }

    fn encryption_suc(&self, keyspace: &str) {
        self.slot(keyspace).en_suc.increment(1);
    }

    fn encryption_fail(&self, keyspace: &str) {
        self.slot(keyspace).en_fail.increment(1);
    }
}
