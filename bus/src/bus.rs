//! Core event bus implementation

use crate::metrics::BusMetrics;
use crate::{Address, BusMessage, BusResult, EventBusError, MessageEnvelope, MessageMetadata};
use common::Ts;
use futures::Stream;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus configuration
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Ring capacity of every channel
    pub capacity: usize,
    /// Number of shards for sharded topics
    pub shards: u32,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            shards: 1,
        }
    }
}

struct Channel<T> {
    sender: broadcast::Sender<MessageEnvelope<T>>,
    next_sequence: AtomicU64,
}

/// Addressed publish/subscribe bus
pub struct EventBus<T: BusMessage> {
    config: EventBusConfig,
    channels: RwLock<FxHashMap<Address, Arc<Channel<T>>>>,
    metrics: Arc<BusMetrics>,
    shut_down: AtomicBool,
}

impl<T: BusMessage> EventBus<T> {
    /// Create a new event bus with configuration
    #[must_use]
    pub fn new(config: EventBusConfig) -> Self {
        Self {
            config: EventBusConfig {
                capacity: config.capacity.max(1),
                shards: config.shards.max(1),
            },
            channels: RwLock::new(FxHashMap::default()),
            metrics: Arc::new(BusMetrics::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Ring capacity per channel
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Shard count for sharded topics
    #[must_use]
    pub const fn shards(&self) -> u32 {
        self.config.shards
    }

    /// Bus metrics
    #[must_use]
    pub fn metrics(&self) -> Arc<BusMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Address `message` is published on
    #[must_use]
    pub fn address_of(&self, message: &T) -> Address {
        Address::resolve(message.topic(), message.partition_key(), self.config.shards)
    }

    fn channel(&self, address: Address) -> Arc<Channel<T>> {
        if let Some(channel) = self.channels.read().get(&address) {
            return Arc::clone(channel);
        }

        let mut channels = self.channels.write();
        Arc::clone(channels.entry(address).or_insert_with(|| {
            let (sender, _) = broadcast::channel(self.config.capacity);
            Arc::new(Channel {
                sender,
                next_sequence: AtomicU64::new(1),
            })
        }))
    }

    /// Publish `message` on its natural address
    ///
    /// Returns the per-address sequence assigned to the message.
    pub fn publish(&self, message: T, source: &str) -> BusResult<u64> {
        let address = self.address_of(&message);
        self.publish_to(address, message, source)
    }

    /// Publish `message` on an explicit address
    pub fn publish_to(&self, address: Address, message: T, source: &str) -> BusResult<u64> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(EventBusError::ShutDown);
        }

        let channel = self.channel(address);
        let sequence = channel.next_sequence.fetch_add(1, Ordering::Relaxed);
        let metadata = MessageMetadata {
            sequence,
            source: source.to_string(),
            correlation_id: message.correlation_id(),
            published: Ts::now(),
        };

        match channel.sender.send(MessageEnvelope::new(message, metadata)) {
            Ok(receivers) => {
                debug!(%address, sequence, receivers, "message published");
                self.metrics.record_publish(address);
                Ok(sequence)
            }
            Err(_) => {
                debug!(%address, sequence, "no subscribers");
                self.metrics.record_no_subscribers(address);
                Err(EventBusError::NoSubscribers { address })
            }
        }
    }

    /// Subscribe to one address
    pub fn subscribe(&self, address: Address) -> BusResult<Subscription<T>> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(EventBusError::ShutDown);
        }

        let receiver = self.channel(address).sender.subscribe();
        Ok(Subscription {
            address,
            receiver,
            last_sequence: None,
            metrics: Arc::clone(&self.metrics),
        })
    }

    /// Current subscriber count on `address`
    #[must_use]
    pub fn subscriber_count(&self, address: Address) -> usize {
        self.channels
            .read()
            .get(&address)
            .map_or(0, |c| c.sender.receiver_count())
    }

    /// Addresses with a live channel
    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.channels.read().keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    /// Refuse new traffic and drop every sender
    ///
    /// Subscribers drain what is already buffered, then observe `Closed`.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        let channels = std::mem::take(&mut *self.channels.write());
        debug!(channels = channels.len(), "event bus shut down");
    }
}

/// Receiving end of one address
///
/// Tracks the envelope sequence to report messages lost to ring overwrite.
pub struct Subscription<T: BusMessage> {
    address: Address,
    receiver: broadcast::Receiver<MessageEnvelope<T>>,
    last_sequence: Option<u64>,
    metrics: Arc<BusMetrics>,
}

impl<T: BusMessage> Subscription<T> {
    /// Address this subscription listens on
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Receive the next envelope
    ///
    /// `Lagged` is reported once per overwrite burst; the next call resumes at
    /// the oldest message still buffered.
    pub async fn recv(&mut self) -> BusResult<MessageEnvelope<T>> {
        match self.receiver.recv().await {
            Ok(envelope) => {
                let sequence = envelope.metadata.sequence;
                if let Some(last) = self.last_sequence {
                    if sequence > last + 1 {
                        let skipped = sequence - last - 1;
                        warn!(address = %self.address, expected = last + 1, received = sequence, "envelope sequence gap");
                        self.metrics.record_lagged(self.address, skipped);
                    }
                }
                self.last_sequence = Some(sequence);
                Ok(envelope)
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(address = %self.address, skipped, "subscriber lagged");
                self.metrics.record_lagged(self.address, skipped);
                self.last_sequence = None;
                Err(EventBusError::Lagged {
                    address: self.address,
                    skipped,
                })
            }
            Err(broadcast::error::RecvError::Closed) => Err(EventBusError::Closed {
                address: self.address,
            }),
        }
    }

    /// Turn into a stream that ends when the channel closes
    pub fn into_stream(self) -> impl Stream<Item = BusResult<MessageEnvelope<T>>> + Send {
        futures::stream::unfold(self, |mut subscription| async move {
            match subscription.recv().await {
                Err(EventBusError::Closed { .. }) => None,
                item => Some((item, subscription)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, Topic};
    use common::{Px, Qty, Symbol, TickUpdate};
    use pretty_assertions::assert_eq;

    fn tick(symbol: u32, sequence: u64) -> Message {
        Message::Tick(TickUpdate {
            ts: Ts::from_nanos(sequence),
            symbol: Symbol::new(symbol),
            bid_price: Px::new(100.0),
            bid_size: Qty::new(1.0),
            ask_price: Px::new(101.0),
            ask_size: Qty::new(1.0),
            sequence,
        })
    }

    fn bus(capacity: usize, shards: u32) -> EventBus<Message> {
        EventBus::new(EventBusConfig { capacity, shards })
    }

    #[tokio::test]
    async fn test_publish_to_shard() -> Result<(), EventBusError> {
        let bus = bus(16, 2);
        let mut shard1 = bus.subscribe(Address::shard(Topic::Ticks, 1))?;

        let seq = bus.publish(tick(3, 1), "test")?;
        assert_eq!(seq, 1);

        let envelope = shard1.recv().await?;
        assert_eq!(envelope.message, tick(3, 1));
        assert_eq!(envelope.metadata.sequence, 1);
        assert_eq!(envelope.metadata.source, "test");
        assert_eq!(bus.metrics().publish_count(Address::shard(Topic::Ticks, 1)), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = bus(16, 2);
        let result = bus.publish(tick(2, 1), "test");
        let address = Address::shard(Topic::Ticks, 0);
        assert_eq!(result, Err(EventBusError::NoSubscribers { address }));
        assert_eq!(bus.metrics().no_subscriber_count(address), 1);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_drops_oldest() -> Result<(), EventBusError> {
        let bus = bus(2, 1);
        let address = Address::shard(Topic::Ticks, 0);
        let mut sub = bus.subscribe(address)?;

        for seq in 1..=5 {
            bus.publish(tick(1, seq), "test")?;
        }

        assert_eq!(
            sub.recv().await,
            Err(EventBusError::Lagged { address, skipped: 3 })
        );
        assert_eq!(sub.recv().await?.metadata.sequence, 4);
        assert_eq!(sub.recv().await?.metadata.sequence, 5);
        assert_eq!(bus.metrics().lagged_count(address), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscribers() -> Result<(), EventBusError> {
        let bus = bus(8, 1);
        let address = Address::topic(Topic::Features);
        let mut sub = bus.subscribe(address)?;

        bus.shutdown();
        assert_eq!(sub.recv().await, Err(EventBusError::Closed { address }));
        assert_eq!(bus.publish(tick(1, 1), "test"), Err(EventBusError::ShutDown));
        assert!(bus.subscribe(address).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_ends_on_close() -> Result<(), EventBusError> {
        use futures::StreamExt;

        let bus = bus(8, 1);
        let address = Address::shard(Topic::Ticks, 0);
        let stream = bus.subscribe(address)?.into_stream();
        bus.publish(tick(1, 1), "test")?;
        bus.shutdown();

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 1);
        Ok(())
    }
}
