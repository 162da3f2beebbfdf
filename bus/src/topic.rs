//! Channel addressing

use common::VenueCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical data stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Normalized quote updates, sharded by symbol
    Ticks,
    /// Top-of-book snapshots and level deltas, sharded by symbol
    Book,
    /// Feature frames
    Features,
    /// Regime/overlay signal events
    Signals,
    /// Order intents from the decision stage
    Orders,
    /// Intents that passed risk
    Approved,
    /// Typed refusals from any stage
    Rejects,
    /// Venue-addressed orders, partitioned by venue
    Routed,
    /// Venue acknowledgements
    Acks,
    /// Venue fills
    Fills,
}

impl Topic {
    /// Every topic
    pub const ALL: [Self; 10] = [
        Self::Ticks,
        Self::Book,
        Self::Features,
        Self::Signals,
        Self::Orders,
        Self::Approved,
        Self::Rejects,
        Self::Routed,
        Self::Acks,
        Self::Fills,
    ];

    /// Channel name prefix
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticks => "ticks",
            Self::Book => "book",
            Self::Features => "features",
            Self::Signals => "signals",
            Self::Orders => "orders",
            Self::Approved => "approved",
            Self::Rejects => "rejects",
            Self::Routed => "routed",
            Self::Acks => "acks",
            Self::Fills => "fills",
        }
    }

    /// Whether the topic is split by symbol shard
    #[must_use]
    pub const fn is_sharded(&self) -> bool {
        matches!(self, Self::Ticks | Self::Book)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single addressable channel: topic plus partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    /// Logical stream
    pub topic: Topic,
    /// Shard index on sharded topics, venue code on `routed`, else 0
    pub partition: u32,
}

impl Address {
    /// Unpartitioned address
    #[must_use]
    pub const fn topic(topic: Topic) -> Self {
        Self { topic, partition: 0 }
    }

    /// Shard `shard` of a sharded topic
    #[must_use]
    pub const fn shard(topic: Topic, shard: u32) -> Self {
        Self { topic, partition: shard }
    }

    /// Venue-addressed routed channel
    #[must_use]
    pub const fn routed(venue: VenueCode) -> Self {
        Self {
            topic: Topic::Routed,
            partition: venue.code(),
        }
    }

    /// Address for a message with partition `key` on a bus with `shards` shards
    #[must_use]
    pub const fn resolve(topic: Topic, key: u32, shards: u32) -> Self {
        let partition = if topic.is_sharded() {
            if shards == 0 { 0 } else { key % shards }
        } else if matches!(topic, Topic::Routed) {
            key
        } else {
            0
        };
        Self { topic, partition }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.topic {
            Topic::Ticks | Topic::Book => write!(f, "{}.{}", self.topic, self.partition),
            Topic::Routed => match VenueCode::from_code(self.partition) {
                Some(venue) => write!(f, "{}.{venue}", self.topic),
                None => write!(f, "{}.{}", self.topic, self.partition),
            },
            _ => write!(f, "{}", self.topic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Topic::Ticks, 7, 4, "ticks.3")]
    #[case(Topic::Book, 7, 1, "book.0")]
    #[case(Topic::Features, 7, 4, "features")]
    #[case(Topic::Routed, 1, 4, "routed.binance")]
    #[case(Topic::Routed, 99, 4, "routed.99")]
    fn test_address_resolution(
        #[case] topic: Topic,
        #[case] key: u32,
        #[case] shards: u32,
        #[case] expected: &str,
    ) {
        assert_eq!(Address::resolve(topic, key, shards).to_string(), expected);
    }

    #[test]
    fn test_routed_address() {
        assert_eq!(
            Address::routed(VenueCode::Kraken),
            Address::resolve(Topic::Routed, 3, 8)
        );
    }
}
