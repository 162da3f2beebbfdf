//! Canonical market data records flowing into and out of the book stage

use crate::constants::BPS_PER_UNIT;
use crate::{Px, Qty, Side, Symbol, Ts};
use serde::{Deserialize, Serialize};

/// Normalized quote update from the ingestion boundary
///
/// A zero size means that side of the quote is empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TickUpdate {
    /// Exchange timestamp
    pub ts: Ts,
    /// Trading symbol
    pub symbol: Symbol,
    /// Best bid price
    pub bid_price: Px,
    /// Best bid size
    pub bid_size: Qty,
    /// Best ask price
    pub ask_price: Px,
    /// Best ask size
    pub ask_size: Qty,
    /// Monotonic per symbol per venue
    pub sequence: u64,
}

impl TickUpdate {
    /// Both sides quoted
    #[must_use]
    pub const fn is_two_sided(&self) -> bool {
        self.bid_size.is_positive() && self.ask_size.is_positive()
    }
}

/// Best bid and offer snapshot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopOfBook {
    /// Timestamp of the tick that produced this snapshot
    pub ts: Ts,
    /// Trading symbol
    pub symbol: Symbol,
    /// Best bid price
    pub bid_price: Px,
    /// Best bid size
    pub bid_size: Qty,
    /// Best ask price
    pub ask_price: Px,
    /// Best ask size
    pub ask_size: Qty,
}

impl TopOfBook {
    /// Mid price, `(bid + ask) / 2` in ticks
    ///
    /// Summed in i128 so extreme prices cannot overflow. An odd tick sum
    /// rounds toward zero, i.e. down for positive prices.
    #[must_use]
    pub fn mid(&self) -> Px {
        let sum = i128::from(self.bid_price.as_i64()) + i128::from(self.ask_price.as_i64());
        Px::from_i64(i64::try_from(sum / 2).unwrap_or(i64::MAX))
    }

    /// Ask minus bid
    #[must_use]
    pub fn spread(&self) -> Px {
        Px::from_i64(self.ask_price.as_i64() - self.bid_price.as_i64())
    }

    /// Spread relative to mid, in basis points
    #[must_use]
    pub fn spread_bps(&self) -> f64 {
        let mid = self.mid().as_f64();
        if mid > 0.0 {
            self.spread().as_f64() / mid * BPS_PER_UNIT
        } else {
            0.0
        }
    }

    /// Size-weighted price: `(bid * ask_size + ask * bid_size) / (bid_size + ask_size)`
    #[must_use]
    pub fn microprice(&self) -> Px {
        let total = i128::from(self.bid_size.as_i64()) + i128::from(self.ask_size.as_i64());
        if total <= 0 {
            return self.mid();
        }
        let weighted = i128::from(self.bid_price.as_i64()) * i128::from(self.ask_size.as_i64())
            + i128::from(self.ask_price.as_i64()) * i128::from(self.bid_size.as_i64());
        Px::from_i64(i64::try_from(weighted / total).unwrap_or(i64::MAX))
    }

    /// Resting size imbalance in [-1, 1], positive when bids dominate
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn imbalance(&self) -> f64 {
        let bid = self.bid_size.as_i64();
        let ask = self.ask_size.as_i64();
        let total = bid + ask;
        if total > 0 {
            (bid - ask) as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// Incremental price level change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BookDelta {
    /// Event timestamp
    pub ts: Ts,
    /// Trading symbol
    pub symbol: Symbol,
    /// Side of the book
    pub side: Side,
    /// Price level
    pub price: Px,
    /// Resting size at this level (0 = remove level)
    pub size: Qty,
}

impl BookDelta {
    /// Check if this delta removes a level
    #[must_use]
    pub const fn is_removal(&self) -> bool {
        self.size.is_zero()
    }
}

/// Category of an external regime signal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalType {
    /// Realized volatility spike
    Vol,
    /// News sentiment, signed by `value`
    News,
    /// New listing window
    Listing,
    /// Social media hype
    Social,
    /// Anything else; carried but not folded into regime flags
    Custom,
}

/// Regime/overlay event from the signal fusion collaborator
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalEvent {
    /// Event timestamp
    pub ts: Ts,
    /// Symbol the signal applies to
    pub symbol: Symbol,
    /// Signal category
    pub sig_type: SignalType,
    /// Signal strength; zero or negative clears the flag (sign matters for news)
    pub value: f64,
    /// Producer-specific sub-code
    pub meta_code: u16,
    /// Producer confidence in [0, 1]
    pub confidence: f64,
}
