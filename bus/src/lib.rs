//! Message fabric for the tick-to-trade pipeline
//!
//! Addressed publish/subscribe channels built on tokio broadcast. Every logical
//! stream (ticks, book, features, ...) has its own [`Topic`]; sharded topics are
//! split further into partitions so each symbol lives on exactly one address.
//!
//! Channels are bounded rings: a slow subscriber loses the oldest messages
//! rather than blocking the publisher, and finds out through a sequence gap.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bus;
pub mod codec;
pub mod message;
pub mod metrics;
pub mod topic;

pub use bus::{EventBus, EventBusConfig, Subscription};
pub use codec::{CodecError, Encoding};
pub use message::{Message, MessageEnvelope, MessageMetadata};
pub use metrics::{AddressMetrics, BusMetrics, BusMetricsSnapshot};
pub use topic::{Address, Topic};

use common::{ClientId, Ts};
use thiserror::Error;

/// Trait for messages carried by the bus
pub trait BusMessage: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Logical stream this message belongs to
    fn topic(&self) -> Topic;

    /// Partition key: symbol id on sharded topics, venue code on `routed`
    fn partition_key(&self) -> u32 {
        0
    }

    /// Order-flow correlation key, if any
    fn correlation_id(&self) -> Option<ClientId> {
        None
    }

    /// Event time of the payload, used for end-to-end latency
    fn event_ts(&self) -> Ts;
}

/// Event bus errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventBusError {
    /// Published to an address nobody listens on
    #[error("no subscribers for {address}")]
    NoSubscribers {
        /// Target address
        address: Address,
    },

    /// Subscriber fell behind and the ring overwrote messages
    #[error("subscriber on {address} lagged, {skipped} messages lost")]
    Lagged {
        /// Subscribed address
        address: Address,
        /// Messages overwritten before they were read
        skipped: u64,
    },

    /// All publishers are gone
    #[error("channel {address} closed")]
    Closed {
        /// Subscribed address
        address: Address,
    },

    /// Bus has been shut down
    #[error("event bus shut down")]
    ShutDown,
}

impl EventBusError {
    /// Whether retrying the same operation later can succeed
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Lagged { .. })
    }
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, EventBusError>;
