//! Test fixtures for common test data

use ::bus::{EventBus, EventBusConfig, Message};
use common::{ManualClock, StaticRegistry, Ts};
use rstest::fixture;
use std::sync::Arc;

/// Unsharded bus with room for a burst of test messages
#[fixture]
pub fn bus() -> Arc<EventBus<Message>> {
    Arc::new(EventBus::new(EventBusConfig {
        capacity: 1024,
        shards: 1,
    }))
}

/// Clock frozen at one second past the epoch
#[fixture]
pub fn clock() -> ManualClock {
    ManualClock::new(Ts::from_millis(1_000))
}

/// Registry with the symbols used across tests
#[fixture]
pub fn registry() -> StaticRegistry {
    StaticRegistry::from_pairs([("BTCUSDT", 1), ("ETHUSDT", 2), ("SOLUSDT", 3)])
        .unwrap_or_default()
}
