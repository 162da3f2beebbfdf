//! Time-bounded sample window

use common::{Px, TopOfBook, Ts};
use std::collections::VecDeque;

/// Sample older than the newest one in the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("sample at {received} is older than window head {latest}")]
pub struct OutOfOrder {
    /// Newest timestamp in the window
    pub latest: Ts,
    /// Timestamp of the rejected sample
    pub received: Ts,
}

/// Top-of-book samples whose age relative to the newest is below `span_ns`
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    span_ns: u64,
    samples: VecDeque<TopOfBook>,
}

impl FeatureWindow {
    /// Empty window spanning `span_ns`
    #[must_use]
    pub fn new(span_ns: u64) -> Self {
        Self {
            span_ns,
            samples: VecDeque::new(),
        }
    }

    /// Add a sample and evict everything at least `span_ns` older than it
    pub fn push(&mut self, sample: TopOfBook) -> Result<(), OutOfOrder> {
        if let Some(latest) = self.samples.back() {
            if sample.ts < latest.ts {
                return Err(OutOfOrder {
                    latest: latest.ts,
                    received: sample.ts,
                });
            }
        }

        let newest = sample.ts;
        self.samples.push_back(sample);
        while let Some(oldest) = self.samples.front() {
            if newest.saturating_since(oldest.ts) >= self.span_ns {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Number of retained samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Retained samples, oldest first
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TopOfBook> {
        self.samples.iter()
    }

    /// Newest sample
    #[must_use]
    pub fn latest(&self) -> Option<&TopOfBook> {
        self.samples.back()
    }

    /// Population standard deviation of consecutive fractional mid returns
    ///
    /// Zero with fewer than two samples.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn realized_vol(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }

        let mids: Vec<f64> = self.samples.iter().map(|s| s.mid().as_f64()).collect();
        let returns: Vec<f64> = mids
            .windows(2)
            .filter(|pair| pair[0] > 0.0)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect();
        if returns.is_empty() {
            return 0.0;
        }

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        variance.sqrt()
    }

    /// Highest mid minus lowest mid
    #[must_use]
    pub fn price_range(&self) -> Px {
        let mut mids = self.samples.iter().map(|s| s.mid().as_i64());
        let Some(first) = mids.next() else {
            return Px::ZERO;
        };
        let (low, high) = mids.fold((first, first), |(lo, hi), m| (lo.min(m), hi.max(m)));
        Px::from_i64(high - low)
    }
}
