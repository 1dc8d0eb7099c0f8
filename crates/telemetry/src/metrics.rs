//! Internal metrics collection.
//!
//! Counters live in-process; a snapshot is logged after every scheduler tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic event counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Current level, e.g. runs in flight.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        self.0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1))
            .ok();
    }
}

/// Running mean and worst case of a latency in milliseconds.
///
/// Subgraph pages and store batches are seconds apart, so a mean plus the
/// slowest observation is enough to spot a degraded endpoint.
#[derive(Debug, Default)]
pub struct LatencySummary {
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl LatencySummary {
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(ms, Ordering::Relaxed);
    }

    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }
}

/// Collected metrics for the harvester.
#[derive(Debug, Default)]
pub struct Metrics {
    // Fetch metrics
    pub pages_fetched: Counter,
    pub records_fetched: Counter,
    pub fetch_retries: Counter,
    pub fetch_errors: Counter,

    // Normalization metrics
    pub events_normalized: Counter,
    pub malformed_pages: Counter,

    // Store metrics
    pub events_stored: Counter,
    pub duplicates_absorbed: Counter,
    pub tokens_upserted: Counter,
    pub partitions_created: Counter,
    pub store_retries: Counter,
    pub store_errors: Counter,

    // Run metrics
    pub runs_succeeded: Counter,
    pub runs_failed: Counter,
    pub ticks: Counter,

    // Latencies
    pub fetch_latency_ms: LatencySummary,
    pub store_latency_ms: LatencySummary,
    pub run_latency_ms: LatencySummary,

    // Gauges
    pub active_runs: Gauge,
    pub sources_configured: Gauge,
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
    pub pages_fetched: u64,
    pub records_fetched: u64,
    pub fetch_retries: u64,
    pub fetch_errors: u64,
    pub events_normalized: u64,
    pub malformed_pages: u64,
    pub events_stored: u64,
    pub duplicates_absorbed: u64,
    pub tokens_upserted: u64,
    pub partitions_created: u64,
    pub store_retries: u64,
    pub store_errors: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub ticks: u64,
    pub fetch_latency_mean_ms: f64,
    pub fetch_latency_max_ms: u64,
    pub store_latency_mean_ms: f64,
    pub store_latency_max_ms: u64,
    pub run_latency_mean_ms: f64,
    pub run_latency_max_ms: u64,
    pub active_runs: u64,
    pub sources_configured: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            pages_fetched: self.pages_fetched.get(),
            records_fetched: self.records_fetched.get(),
            fetch_retries: self.fetch_retries.get(),
            fetch_errors: self.fetch_errors.get(),
            events_normalized: self.events_normalized.get(),
            malformed_pages: self.malformed_pages.get(),
            events_stored: self.events_stored.get(),
            duplicates_absorbed: self.duplicates_absorbed.get(),
            tokens_upserted: self.tokens_upserted.get(),
            partitions_created: self.partitions_created.get(),
            store_retries: self.store_retries.get(),
            store_errors: self.store_errors.get(),
            runs_succeeded: self.runs_succeeded.get(),
            runs_failed: self.runs_failed.get(),
            ticks: self.ticks.get(),
            fetch_latency_mean_ms: self.fetch_latency_ms.mean(),
            fetch_latency_max_ms: self.fetch_latency_ms.max(),
            store_latency_mean_ms: self.store_latency_ms.mean(),
            store_latency_max_ms: self.store_latency_ms.max(),
            run_latency_mean_ms: self.run_latency_ms.mean(),
            run_latency_max_ms: self.run_latency_ms.max(),
            active_runs: self.active_runs.get(),
            sources_configured: self.sources_configured.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
