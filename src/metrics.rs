//! In-process counters for the reporter pipeline and the sampling engine.
//!
//! There is no metrics backend here. The host constructs the counter
//! handles (or lets the builders create fresh ones), shares them via
//! `Arc`, and scrapes them however it likes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by a [`RemoteReporter`](crate::reporter::RemoteReporter).
#[derive(Debug, Default)]
pub struct ReporterMetrics {
    spans_submitted: AtomicU64,
    spans_dropped: AtomicU64,
    spans_sent: AtomicU64,
    spans_transport_failed: AtomicU64,
    batches_failed: AtomicU64,
}

impl ReporterMetrics {
    /// Spans handed to `report`, whether or not they were accepted.
    pub fn spans_submitted(&self) -> u64 {
        self.spans_submitted.load(Ordering::Relaxed)
    }

    /// Spans dropped because the queue was full or the reporter closed.
    pub fn spans_dropped(&self) -> u64 {
        self.spans_dropped.load(Ordering::Relaxed)
    }

    /// Spans the transport confirmed as sent.
    pub fn spans_sent(&self) -> u64 {
        self.spans_sent.load(Ordering::Relaxed)
    }

    /// Spans lost to transport append failures.
    pub fn spans_transport_failed(&self) -> u64 {
        self.spans_transport_failed.load(Ordering::Relaxed)
    }

    /// Batch flushes that failed on the wire.
    pub fn batches_failed(&self) -> u64 {
        self.batches_failed.load(Ordering::Relaxed)
    }

    pub(crate) fn add_submitted(&self, n: u64) {
        self.spans_submitted.fetch_add(n, Ordering::Relaxed);
    }

    /// Returns the previous drop count so callers can warn on first drop
    /// only.
    pub(crate) fn add_dropped(&self, n: u64) -> u64 {
        self.spans_dropped.fetch_add(n, Ordering::Relaxed)
    }

    pub(crate) fn add_sent(&self, n: u64) {
        self.spans_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_transport_failed(&self, n: u64) {
        self.spans_transport_failed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn add_batch_failed(&self) {
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counters maintained by a
/// [`RemotelyControlledSampler`](crate::sampler::RemotelyControlledSampler).
#[derive(Debug, Default)]
pub struct SamplerMetrics {
    strategy_updates: AtomicU64,
    strategy_fetch_failures: AtomicU64,
}

impl SamplerMetrics {
    /// Successfully applied strategy refreshes.
    pub fn strategy_updates(&self) -> u64 {
        self.strategy_updates.load(Ordering::Relaxed)
    }

    /// Failed strategy fetches (the current sampler was retained).
    pub fn strategy_fetch_failures(&self) -> u64 {
        self.strategy_fetch_failures.load(Ordering::Relaxed)
    }

    pub(crate) fn add_update(&self) {
        self.strategy_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_fetch_failure(&self) {
        self.strategy_fetch_failures.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporter_counters_accumulate() {
        let metrics = ReporterMetrics::default();
        metrics.add_submitted(3);
        assert_eq!(metrics.add_dropped(1), 0);
        assert_eq!(metrics.add_dropped(2), 1);
        metrics.add_sent(2);
        metrics.add_transport_failed(1);
        metrics.add_batch_failed();

        assert_eq!(metrics.spans_submitted(), 3);
        assert_eq!(metrics.spans_dropped(), 3);
        assert_eq!(metrics.spans_sent(), 2);
        assert_eq!(metrics.spans_transport_failed(), 1);
        assert_eq!(metrics.batches_failed(), 1);
    }
}
