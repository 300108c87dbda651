//! FindX queue and delivery counters.
//!
//! Same capability-seam pattern as the conversion metrics: a no-op
//! default, and a recorder-backed variant with pre-registered counter
//! handles so enqueue accounting stays lock-free.

use metrics::{counter, Counter};

/// Capability seam for FindX metrics.
pub trait FindxMetrics: Send + Sync {
    /// Id accepted into the queue.
    fn add_suc(&self);
    /// Id dropped because the queue was full.
    fn add_fail(&self);
    /// Id rejected by upstream policy before enqueueing.
    fn add_rej(&self);
    /// Delivery answered with a 2xx.
    fn sent_suc(&self);
    /// Delivery failed (transport error or 5xx).
    fn sent_fail(&self);
    /// Delivery answered with a 4xx; not retried.
    fn sent_rej(&self);
}

/// Default provider; drops everything.
pub struct NoopFindxMetrics;

impl FindxMetrics for NoopFindxMetrics {
    fn add_suc(&self) {}
    fn add_fail(&self) {}
    fn add_rej(&self) {}
    fn sent_suc(&self) {}
    fn sent_fail(&self) {}
    fn sent_rej(&self) {}
}

/// Counters registered with the installed metrics recorder, one series
/// per keyspace and outcome.
pub struct RecorderFindxMetrics {
    add_suc: Counter,
    add_fail: Counter,
    add_rej: Counter,
    sent_suc: Counter,
    sent_fail: Counter,
    sent_rej: Counter,
}

impl RecorderFindxMetrics {
    #[must_use]
    pub fn new(keyspace: &str) -> Self {
        let labelled = |name: &'static str, code: &'static str| {
            counter!(name, "keyspace" => keyspace.to_owned(), "code" => code)
        };
        Self {
            add_suc: labelled("xdas_findx_add", "suc"),
            add_fail: labelled("xdas_findx_add", "fail"),
            add_rej: labelled("xdas_findx_add", "rej"),
            sent_suc: labelled("xdas_findx_sent", "suc"),
            sent_fail: labelled("xdas_findx_sent", "fail"),
            sent_rej: labelled("xdas_findx_sent", "rej"),
        }
    }
}

impl FindxMetrics for RecorderFindxMetrics {
    fn add_suc(&self) {
        self.add_suc.increment(1);
    }
    fn add_fail(&self) {
        self.add_fail.increment(1);
    }
    fn add_rej(&self) {
        self.add_rej.increment(1);
    }
    fn sent_suc(&self) {
        self.sent_suc.increment(1);
    }
    fn sent_fail(&self) {
        self.sent_fail.increment(1);
    }
    fn sent_rej(&self) {
        self.sent_rej.increment(1);
    }
}
