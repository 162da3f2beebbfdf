//! Closed message set and envelope

use crate::{BusMessage, Topic};
use common::{
    BookDelta, ClientId, FeatureFrame, Fill, OrderAck, OrderIntent, Reject, RoutedOrder,
    SignalEvent, TickUpdate, TopOfBook, Ts,
};
use serde::{Deserialize, Serialize};

/// Every payload the pipeline exchanges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Quote update from ingestion
    Tick(TickUpdate),
    /// Best bid/offer snapshot
    TopOfBook(TopOfBook),
    /// Price level change
    BookDelta(BookDelta),
    /// Feature frame
    Features(FeatureFrame),
    /// Regime signal
    Signal(SignalEvent),
    /// Order intent awaiting risk
    Intent(OrderIntent),
    /// Intent approved by risk
    Approved(OrderIntent),
    /// Typed refusal
    Reject(Reject),
    /// Venue-addressed order
    Routed(RoutedOrder),
    /// Venue acknowledgement
    Ack(OrderAck),
    /// Venue fill
    Fill(Fill),
}

impl Message {
    /// Variant name for logs and counters
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Tick(_) => "tick",
            Self::TopOfBook(_) => "top_of_book",
            Self::BookDelta(_) => "book_delta",
            Self::Features(_) => "features",
            Self::Signal(_) => "signal",
            Self::Intent(_) => "intent",
            Self::Approved(_) => "approved",
            Self::Reject(_) => "reject",
            Self::Routed(_) => "routed",
            Self::Ack(_) => "ack",
            Self::Fill(_) => "fill",
        }
    }
}

impl BusMessage for Message {
    fn topic(&self) -> Topic {
        match self {
            Self::Tick(_) => Topic::Ticks,
            Self::TopOfBook(_) | Self::BookDelta(_) => Topic::Book,
            Self::Features(_) => Topic::Features,
            Self::Signal(_) => Topic::Signals,
            Self::Intent(_) => Topic::Orders,
            Self::Approved(_) => Topic::Approved,
            Self::Reject(_) => Topic::Rejects,
            Self::Routed(_) => Topic::Routed,
            Self::Ack(_) => Topic::Acks,
            Self::Fill(_) => Topic::Fills,
        }
    }

    fn partition_key(&self) -> u32 {
        match self {
            Self::Tick(t) => t.symbol.0,
            Self::TopOfBook(t) => t.symbol.0,
            Self::BookDelta(d) => d.symbol.0,
            Self::Routed(r) => r.venue.code(),
            _ => 0,
        }
    }

    fn correlation_id(&self) -> Option<ClientId> {
        match self {
            Self::Intent(i) | Self::Approved(i) => Some(i.client_id),
            Self::Reject(r) => Some(r.client_id),
            Self::Routed(r) => Some(r.intent.client_id),
            Self::Ack(a) => Some(a.client_id),
            Self::Fill(f) => Some(f.client_id),
            Self::Tick(_)
            | Self::TopOfBook(_)
            | Self::BookDelta(_)
            | Self::Features(_)
            | Self::Signal(_) => None,
        }
    }

    fn event_ts(&self) -> Ts {
        match self {
            Self::Tick(t) => t.ts,
            Self::TopOfBook(t) => t.ts,
            Self::BookDelta(d) => d.ts,
            Self::Features(f) => f.ts,
            Self::Signal(s) => s.ts,
            Self::Intent(i) | Self::Approved(i) => i.ts,
            Self::Reject(r) => r.ts,
            Self::Routed(r) => r.intent.ts,
            Self::Ack(a) => a.ts,
            Self::Fill(f) => f.ts,
        }
    }
}

/// Per-message delivery metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageMetadata {
    /// Per-address publish sequence, starting at 1
    pub sequence: u64,
    /// Publishing stage
    pub source: String,
    /// Order-flow correlation key
    pub correlation_id: Option<ClientId>,
    /// Publish wall-clock time
    pub published: Ts,
}

/// Message envelope wrapping the payload with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    /// The actual message
    pub message: T,
    /// Message metadata
    pub metadata: MessageMetadata,
}

impl<T: BusMessage> MessageEnvelope<T> {
    /// Create a new message envelope
    pub const fn new(message: T, metadata: MessageMetadata) -> Self {
        Self { message, metadata }
    }

    /// Nanoseconds from the payload's event time to `now`
    pub fn age_ns(&self, now: Ts) -> u64 {
        now.saturating_since(self.message.event_ts())
    }
}
