//! Per-address delivery counters

use crate::Address;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Bus metrics collector
pub struct BusMetrics {
    /// Successful publishes by address
    published: RwLock<FxHashMap<Address, AtomicU64>>,
    /// Publishes that found no subscriber
    no_subscribers: RwLock<FxHashMap<Address, AtomicU64>>,
    /// Messages lost to slow subscribers
    lagged: RwLock<FxHashMap<Address, AtomicU64>>,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl BusMetrics {
    /// Create new metrics collector
    #[must_use]
    pub fn new() -> Self {
        Self {
            published: RwLock::new(FxHashMap::default()),
            no_subscribers: RwLock::new(FxHashMap::default()),
            lagged: RwLock::new(FxHashMap::default()),
            start_time: Instant::now(),
        }
    }

    fn bump(map: &RwLock<FxHashMap<Address, AtomicU64>>, address: Address, by: u64) {
        let counters = map.read();
        if let Some(counter) = counters.get(&address) {
            counter.fetch_add(by, Ordering::Relaxed);
        } else {
            drop(counters);
            map.write()
                .entry(address)
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(by, Ordering::Relaxed);
        }
    }

    fn read(map: &RwLock<FxHashMap<Address, AtomicU64>>, address: Address) -> u64 {
        map.read()
            .get(&address)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Record a successful publish
    pub fn record_publish(&self, address: Address) {
        Self::bump(&self.published, address, 1);
    }

    /// Record a publish with no subscribers
    pub fn record_no_subscribers(&self, address: Address) {
        Self::bump(&self.no_subscribers, address, 1);
    }

    /// Record `skipped` messages overwritten before a subscriber read them
    pub fn record_lagged(&self, address: Address, skipped: u64) {
        Self::bump(&self.lagged, address, skipped);
    }

    /// Successful publishes on `address`
    pub fn publish_count(&self, address: Address) -> u64 {
        Self::read(&self.published, address)
    }

    /// Subscriber-less publishes on `address`
    pub fn no_subscriber_count(&self, address: Address) -> u64 {
        Self::read(&self.no_subscribers, address)
    }

    /// Messages lost on `address`
    pub fn lagged_count(&self, address: Address) -> u64 {
        Self::read(&self.lagged, address)
    }

    /// Snapshot of every address seen so far, sorted by address
    pub fn snapshot(&self) -> BusMetricsSnapshot {
        let mut addresses: Vec<Address> = self.published.read().keys().copied().collect();
        addresses.extend(self.no_subscribers.read().keys().copied());
        addresses.extend(self.lagged.read().keys().copied());
        addresses.sort_unstable();
        addresses.dedup();

        let addresses = addresses
            .into_iter()
            .map(|address| AddressMetrics {
                address: address.to_string(),
                published: self.publish_count(address),
                no_subscribers: self.no_subscriber_count(address),
                lagged: self.lagged_count(address),
            })
            .collect();

        BusMetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            addresses,
        }
    }
}

impl Default for BusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time bus metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMetricsSnapshot {
    /// Bus uptime in seconds
    pub uptime_seconds: u64,
    /// Counters by address
    pub addresses: Vec<AddressMetrics>,
}

/// Counters for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMetrics {
    /// Channel name, e.g. `ticks.0`
    pub address: String,
    /// Successful publishes
    pub published: u64,
    /// Publishes nobody received
    pub no_subscribers: u64,
    /// Messages lost to slow subscribers
    pub lagged: u64,
}
