//! Order flow records: intents, routed orders, venue reports and rejects

use crate::{Px, Qty, Side, Symbol, Ts};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Idempotency key assigned once per order intent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Fresh random (v4) client id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Order type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Execute at best available price
    Market,
    /// Execute at limit price or better
    Limit,
}

/// Time in force
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancel
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
    /// Post only
    Gtx,
}

/// Exchange venue codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VenueCode {
    /// Binance
    Binance,
    /// Coinbase
    Coinbase,
    /// Kraken
    Kraken,
    /// Bybit
    Bybit,
    /// OKX
    Okx,
    /// Binance US
    BinanceUs,
    /// Gemini
    Gemini,
    /// Bitstamp
    Bitstamp,
}

impl VenueCode {
    /// Every known venue
    pub const ALL: [Self; 8] = [
        Self::Binance,
        Self::Coinbase,
        Self::Kraken,
        Self::Bybit,
        Self::Okx,
        Self::BinanceUs,
        Self::Gemini,
        Self::Bitstamp,
    ];

    /// Stable numeric code
    #[must_use]
    pub const fn code(&self) -> u32 {
        match self {
            Self::Binance => 1,
            Self::Coinbase => 2,
            Self::Kraken => 3,
            Self::Bybit => 4,
            Self::Okx => 5,
            Self::BinanceUs => 6,
            Self::Gemini => 7,
            Self::Bitstamp => 8,
        }
    }

    /// Lookup by numeric code
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.code() == code)
    }

    /// Lowercase venue name used in channel addresses and config
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Coinbase => "coinbase",
            Self::Kraken => "kraken",
            Self::Bybit => "bybit",
            Self::Okx => "okx",
            Self::BinanceUs => "binance_us",
            Self::Gemini => "gemini",
            Self::Bitstamp => "bitstamp",
        }
    }
}

impl fmt::Display for VenueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VenueCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown venue: {s}"))
    }
}

/// Order intent produced by the decision stage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderIntent {
    /// Decision timestamp (event time of the driving frame)
    pub ts: Ts,
    /// Globally unique correlation key
    pub client_id: ClientId,
    /// Trading symbol
    pub symbol: Symbol,
    /// Buy or sell
    pub side: Side,
    /// Market or limit
    pub order_type: OrderType,
    /// Order size
    pub qty: Qty,
    /// Limit price, absent for market orders
    pub price: Option<Px>,
    /// Time in force
    pub time_in_force: TimeInForce,
    /// Preferred venue, `None` lets the router decide
    pub route_hint: Option<VenueCode>,
    /// Index of the layer whose verdict produced this order
    pub decision_layer: u8,
    /// Final confidence in [0, 1]
    pub confidence: f64,
}

/// Intent that passed risk and has a resolved venue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoutedOrder {
    /// The approved intent, unmodified
    pub intent: OrderIntent,
    /// Resolved venue
    pub venue: VenueCode,
    /// When the router forwarded it
    pub routed_ts: Ts,
}

/// Venue-side order status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckStatus {
    /// Accepted, not yet live
    Pending,
    /// Live on the venue
    Submitted,
    /// Partially filled
    Partial,
    /// Fully filled
    Filled,
    /// Cancelled
    Cancelled,
    /// Rejected by venue
    Rejected,
    /// Expired
    Expired,
}

/// Venue acknowledgement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderAck {
    /// Ack timestamp
    pub ts: Ts,
    /// Original client id
    pub client_id: ClientId,
    /// Venue-assigned order id
    pub venue_order_id: String,
    /// Order status at the venue
    pub status: AckStatus,
    /// Venue
    pub venue: VenueCode,
    /// When the order was submitted
    pub submit_ts: Ts,
}

impl OrderAck {
    /// Submit-to-ack round trip in nanoseconds
    #[must_use]
    pub const fn latency_ns(&self) -> u64 {
        self.ts.saturating_since(self.submit_ts)
    }
}

/// Execution report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fill {
    /// Fill timestamp
    pub ts: Ts,
    /// Original client id
    pub client_id: ClientId,
    /// Venue-assigned order id
    pub venue_order_id: String,
    /// Trading symbol
    pub symbol: Symbol,
    /// Side of our order
    pub side: Side,
    /// Execution price
    pub price: Px,
    /// Executed quantity
    pub qty: Qty,
    /// Fee charged, in quote units
    pub fee: Px,
    /// Venue
    pub venue: VenueCode,
    /// Whether we provided liquidity
    pub is_maker: bool,
    /// Venue trade id
    pub trade_id: String,
}

/// Stage that produced a reject
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStage {
    /// Pre-trade risk
    Risk,
    /// Venue routing
    Router,
    /// Venue boundary
    Venue,
    /// Infrastructure
    System,
}

impl fmt::Display for SourceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Risk => f.write_str("risk"),
            Self::Router => f.write_str("router"),
            Self::Venue => f.write_str("venue"),
            Self::System => f.write_str("system"),
        }
    }
}

/// Closed reject taxonomy; codes are stable for replay
///
/// Codes 101-106 keep the numbering of the recorded reject streams; 102, 105
/// and 106 are decoded but never raised by the risk checks here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// Order or resulting position notional above its cap
    PositionLimit,
    /// Aggregate notional above the account cap
    NotionalLimit,
    /// Price too far from last known price
    PriceBand,
    /// Too many orders in the current window
    RateLimit,
    /// Inventory above the per-symbol cap
    InventoryLimit,
    /// Exposure concentrated in one symbol
    ConcentrationLimit,
    /// Non-positive quantity
    InvalidQuantity,
    /// Non-positive price
    InvalidPrice,
    /// No venue could be resolved
    NoRoute,
    /// Resolved venue is not configured
    VenueUnavailable,
    /// Not enough balance on the venue
    InsufficientBalance,
    /// Venue refused the price
    VenueInvalidPrice,
    /// Venue refused the quantity
    VenueInvalidQuantity,
    /// Venue reports insufficient funds
    InsufficientFunds,
    /// Market closed
    MarketClosed,
    /// Venue throttled us
    VenueRateLimited,
    /// Internal failure
    InternalError,
    /// Timed out waiting on a collaborator
    Timeout,
    /// Symbol unknown to the registry
    InvalidSymbol,
}

impl RejectReason {
    /// Every reason in code order
    pub const ALL: [Self; 19] = [
        Self::PositionLimit,
        Self::NotionalLimit,
        Self::PriceBand,
        Self::RateLimit,
        Self::InventoryLimit,
        Self::ConcentrationLimit,
        Self::InvalidQuantity,
        Self::InvalidPrice,
        Self::NoRoute,
        Self::VenueUnavailable,
        Self::InsufficientBalance,
        Self::VenueInvalidPrice,
        Self::VenueInvalidQuantity,
        Self::InsufficientFunds,
        Self::MarketClosed,
        Self::VenueRateLimited,
        Self::InternalError,
        Self::Timeout,
        Self::InvalidSymbol,
    ];

    /// Stable numeric code
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::PositionLimit => 101,
            Self::NotionalLimit => 102,
            Self::PriceBand => 103,
            Self::RateLimit => 104,
            Self::InventoryLimit => 105,
            Self::ConcentrationLimit => 106,
            Self::InvalidQuantity => 107,
            Self::InvalidPrice => 108,
            Self::NoRoute => 201,
            Self::VenueUnavailable => 202,
            Self::InsufficientBalance => 203,
            Self::VenueInvalidPrice => 301,
            Self::VenueInvalidQuantity => 302,
            Self::InsufficientFunds => 303,
            Self::MarketClosed => 304,
            Self::VenueRateLimited => 305,
            Self::InternalError => 401,
            Self::Timeout => 402,
            Self::InvalidSymbol => 403,
        }
    }

    /// Lookup by numeric code
    #[must_use]
    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    /// Stage family the code belongs to
    #[must_use]
    pub const fn origin(&self) -> SourceStage {
        match self.code() / 100 {
            1 => SourceStage::Risk,
            2 => SourceStage::Router,
            3 => SourceStage::Venue,
            _ => SourceStage::System,
        }
    }

    /// Short human-readable description
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::PositionLimit => "position limit exceeded",
            Self::NotionalLimit => "notional limit exceeded",
            Self::PriceBand => "price outside band",
            Self::RateLimit => "order rate limit exceeded",
            Self::InventoryLimit => "inventory limit exceeded",
            Self::ConcentrationLimit => "concentration limit exceeded",
            Self::InvalidQuantity => "invalid quantity",
            Self::InvalidPrice => "invalid price",
            Self::NoRoute => "no route to venue",
            Self::VenueUnavailable => "venue unavailable",
            Self::InsufficientBalance => "insufficient balance",
            Self::VenueInvalidPrice => "venue rejected price",
            Self::VenueInvalidQuantity => "venue rejected quantity",
            Self::InsufficientFunds => "insufficient funds",
            Self::MarketClosed => "market closed",
            Self::VenueRateLimited => "venue rate limited",
            Self::InternalError => "internal error",
            Self::Timeout => "timeout",
            Self::InvalidSymbol => "invalid symbol",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

/// Typed refusal of an order intent
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reject {
    /// Reject timestamp
    pub ts: Ts,
    /// Correlation key of the refused intent
    pub client_id: ClientId,
    /// Stable reason code
    pub reason_code: u16,
    /// Explanation with the offending values
    pub reason_text: String,
    /// Producing stage
    pub source_stage: SourceStage,
    /// Trading symbol of the refused intent
    pub symbol: Symbol,
}

impl Reject {
    /// Build a reject for `intent`; the source stage follows from the reason code
    #[must_use]
    pub fn new(ts: Ts, intent: &OrderIntent, reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            ts,
            client_id: intent.client_id,
            reason_code: reason.code(),
            reason_text: detail.into(),
            source_stage: reason.origin(),
            symbol: intent.symbol,
        }
    }

    /// Decoded reason, `None` for codes from a newer producer
    #[must_use]
    pub fn reason(&self) -> Option<RejectReason> {
        RejectReason::from_code(self.reason_code)
    }
}
