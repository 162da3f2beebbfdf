//! Stage counters and latency histograms

use crate::constants::HISTOGRAM_SIGFIG;
use crate::errors::ErrorKind;
use hdrhistogram::Histogram;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Latency distribution over nanosecond samples
pub struct LatencyTracker {
    histogram: Mutex<Option<Histogram<u64>>>,
    samples: AtomicU64,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyTracker {
    /// Create new latency tracker
    ///
    /// Auto-resizing, so any nanosecond value can be recorded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            histogram: Mutex::new(Histogram::new(HISTOGRAM_SIGFIG).ok()),
            samples: AtomicU64::new(0),
        }
    }

    /// Record one sample
    #[inline]
    pub fn record_ns(&self, latency_ns: u64) {
        self.samples.fetch_add(1, Ordering::Relaxed);
        if let Some(histogram) = self.histogram.lock().as_mut() {
            let _ = histogram.record(latency_ns.max(1));
        }
    }

    /// Record one elapsed duration
    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub fn record(&self, elapsed: Duration) {
        self.record_ns(elapsed.as_nanos() as u64);
    }

    /// Samples recorded so far
    pub fn count(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Percentile summary, `None` before the first sample
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn snapshot(&self) -> Option<LatencySnapshot> {
        let guard = self.histogram.lock();
        let histogram = guard.as_ref()?;
        if histogram.is_empty() {
            return None;
        }
        Some(LatencySnapshot {
            count: self.count(),
            min: histogram.min(),
            max: histogram.max(),
            mean: histogram.mean() as u64,
            p50: histogram.value_at_quantile(0.50),
            p90: histogram.value_at_quantile(0.90),
            p99: histogram.value_at_quantile(0.99),
            p999: histogram.value_at_quantile(0.999),
        })
    }
}

/// Latency percentiles in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencySnapshot {
    /// Sample count
    pub count: u64,
    /// Minimum
    pub min: u64,
    /// Maximum
    pub max: u64,
    /// Mean
    pub mean: u64,
    /// Median
    pub p50: u64,
    /// 90th percentile
    pub p90: u64,
    /// 99th percentile
    pub p99: u64,
    /// 99.9th percentile
    pub p999: u64,
}

/// Counters and histograms for one stage instance
pub struct StageMetrics {
    stage: String,
    received: AtomicU64,
    emitted: AtomicU64,
    unrouted: AtomicU64,
    lagged: AtomicU64,
    dropped: AtomicU64,
    transient_errors: AtomicU64,
    fatal_errors: AtomicU64,
    /// Stage-specific counters (gaps, throttles, rejects by code, ...)
    counters: RwLock<FxHashMap<&'static str, AtomicU64>>,
    /// Handler wall time per message
    processing: LatencyTracker,
    /// Payload event time to handler start
    end_to_end: LatencyTracker,
}

impl StageMetrics {
    /// Create metrics for `stage`
    #[must_use]
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            received: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            unrouted: AtomicU64::new(0),
            lagged: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            transient_errors: AtomicU64::new(0),
            fatal_errors: AtomicU64::new(0),
            counters: RwLock::new(FxHashMap::default()),
            processing: LatencyTracker::new(),
            end_to_end: LatencyTracker::new(),
        }
    }

    /// Stage label
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Message taken off an input channel
    #[inline]
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Message published downstream
    #[inline]
    pub fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Output published with no subscriber attached
    #[inline]
    pub fn record_unrouted(&self) {
        self.unrouted.fetch_add(1, Ordering::Relaxed);
    }

    /// Input messages lost to ring overwrite
    #[inline]
    pub fn record_lagged(&self, skipped: u64) {
        self.lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    /// Handler failure of the given kind
    #[inline]
    pub fn record_error(&self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::DataQuality => &self.dropped,
            ErrorKind::Transient => &self.transient_errors,
            ErrorKind::Fatal => &self.fatal_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Handler processing time
    #[inline]
    pub fn record_processing(&self, elapsed: Duration) {
        self.processing.record(elapsed);
    }

    /// Age of an input at the moment the handler picked it up
    #[inline]
    pub fn record_end_to_end(&self, age_ns: u64) {
        self.end_to_end.record_ns(age_ns);
    }

    /// Bump a stage-specific counter
    pub fn incr(&self, name: &'static str) {
        self.add(name, 1);
    }

    /// Add to a stage-specific counter
    pub fn add(&self, name: &'static str, by: u64) {
        let counters = self.counters.read();
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(by, Ordering::Relaxed);
        } else {
            drop(counters);
            self.counters
                .write()
                .entry(name)
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(by, Ordering::Relaxed);
        }
    }

    /// Current value of a stage-specific counter
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Messages received
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Messages emitted
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Messages dropped as data-quality failures
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Transient handler failures
    pub fn transient_errors(&self) -> u64 {
        self.transient_errors.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of everything
    pub fn snapshot(&self) -> StageMetricsSnapshot {
        let mut counters: Vec<(String, u64)> = self
            .counters
            .read()
            .iter()
            .map(|(name, value)| ((*name).to_string(), value.load(Ordering::Relaxed)))
            .collect();
        counters.sort();

        StageMetricsSnapshot {
            stage: self.stage.clone(),
            received: self.received(),
            emitted: self.emitted(),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            lagged: self.lagged.load(Ordering::Relaxed),
            dropped: self.dropped(),
            transient_errors: self.transient_errors(),
            fatal_errors: self.fatal_errors.load(Ordering::Relaxed),
            counters,
            processing: self.processing.snapshot(),
            end_to_end: self.end_to_end.snapshot(),
        }
    }
}

/// Serializable stage metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageMetricsSnapshot {
    /// Stage label
    pub stage: String,
    /// Messages received
    pub received: u64,
    /// Messages emitted
    pub emitted: u64,
    /// Outputs nobody was subscribed to
    pub unrouted: u64,
    /// Inputs lost to ring overwrite
    pub lagged: u64,
    /// Data-quality drops
    pub dropped: u64,
    /// Transient failures
    pub transient_errors: u64,
    /// Fatal failures
    pub fatal_errors: u64,
    /// Stage-specific counters, sorted by name
    pub counters: Vec<(String, u64)>,
    /// Handler processing latency
    pub processing: Option<LatencySnapshot>,
    /// Event-time to handler latency
    pub end_to_end: Option<LatencySnapshot>,
}
