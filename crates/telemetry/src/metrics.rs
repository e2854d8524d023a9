//! Internal metrics collection.
//!
//! Collects metrics in-memory; the scheduler periodically logs a snapshot.
//! Cache failures have their own counter so a stale cache is never mistaken
//! for a failed data mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Upper bucket bound at or below which `quantile` of the observations
    /// fall. Zero when nothing was observed.
    pub fn percentile(&self, quantile: f64) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }

        let target = ((count as f64) * quantile.clamp(0.0, 1.0)).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (bound, bucket) in Self::BUCKET_BOUNDS.iter().zip(self.buckets.iter()) {
            seen += bucket.load(Ordering::Relaxed);
            if seen >= target {
                return *bound;
            }
        }
        Self::BUCKET_BOUNDS[Self::BUCKET_BOUNDS.len() - 1]
    }
}

/// Collected metrics for the lead worker.
#[derive(Debug, Default)]
pub struct Metrics {
    // Queue
    pub messages_received: Counter,
    pub messages_acked: Counter,
    pub messages_nacked: Counter,
    pub messages_requeued: Counter,
    pub messages_lost: Counter,
    pub ack_errors: Counter,

    // Codec
    pub malformed_messages: Counter,
    pub empty_key_messages: Counter,

    // Enrichment
    pub leads_enriched: Counter,
    pub leads_not_found: Counter,
    pub transaction_errors: Counter,
    pub timeouts: Counter,

    // Cache
    pub cache_invalidations: Counter,
    pub cache_errors: Counter,

    // Webhook
    pub webhook_messages: Counter,

    // Connection supervisor
    pub connection_attempts: Counter,
    pub connection_failures: Counter,

    // Latency histograms
    pub transaction_latency_ms: Histogram,
    pub cache_latency_ms: Histogram,
    pub pipeline_latency_ms: Histogram,

    // Gauges
    pub in_flight: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub messages_received: u64,
    pub messages_acked: u64,
    pub messages_nacked: u64,
    pub messages_requeued: u64,
    pub messages_lost: u64,
    pub ack_errors: u64,
    pub malformed_messages: u64,
    pub empty_key_messages: u64,
    pub leads_enriched: u64,
    pub leads_not_found: u64,
    pub transaction_errors: u64,
    pub timeouts: u64,
    pub cache_invalidations: u64,
    pub cache_errors: u64,
    pub webhook_messages: u64,
    pub connection_attempts: u64,
    pub connection_failures: u64,
    pub transaction_latency_mean_ms: f64,
    pub cache_latency_mean_ms: f64,
    pub cache_latency_p99_ms: u64,
    pub pipeline_latency_mean_ms: f64,
    pub pipeline_latency_p99_ms: u64,
    pub in_flight: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            messages_received: self.messages_received.get(),
            messages_acked: self.messages_acked.get(),
            messages_nacked: self.messages_nacked.get(),
            messages_requeued: self.messages_requeued.get(),
            messages_lost: self.messages_lost.get(),
            ack_errors: self.ack_errors.get(),
            malformed_messages: self.malformed_messages.get(),
            empty_key_messages: self.empty_key_messages.get(),
            leads_enriched: self.leads_enriched.get(),
            leads_not_found: self.leads_not_found.get(),
            transaction_errors: self.transaction_errors.get(),
            timeouts: self.timeouts.get(),
            cache_invalidations: self.cache_invalidations.get(),
            cache_errors: self.cache_errors.get(),
            webhook_messages: self.webhook_messages.get(),
            connection_attempts: self.connection_attempts.get(),
            connection_failures: self.connection_failures.get(),
            transaction_latency_mean_ms: self.transaction_latency_ms.mean(),
            cache_latency_mean_ms: self.cache_latency_ms.mean(),
            cache_latency_p99_ms: self.cache_latency_ms.percentile(0.99),
            pipeline_latency_mean_ms: self.pipeline_latency_ms.mean(),
            pipeline_latency_p99_ms: self.pipeline_latency_ms.percentile(0.99),
            in_flight: self.in_flight.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
