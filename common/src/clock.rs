//! Time sources
//!
//! Stages that need wall-clock time (routing throttle, venue timestamps) take a
//! `Clock` so replays and tests can drive time by hand.

use crate::Ts;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current timestamp
    fn now(&self) -> Ts;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Ts {
        Ts::now()
    }
}

/// Manually advanced clock, shared between clones
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock frozen at `start`
    #[must_use]
    pub fn new(start: Ts) -> Self {
        Self {
            nanos: Arc::new(AtomicU64::new(start.as_nanos())),
        }
    }

    /// Jump to `ts`
    pub fn set(&self, ts: Ts) {
        self.nanos.store(ts.as_nanos(), Ordering::Release);
    }

    /// Move forward by `nanos`
    pub fn advance(&self, nanos: u64) {
        self.nanos.fetch_add(nanos, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Ts {
        Ts::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}
