//! Feature frames and regime flags produced by the feature stage

use crate::{Px, Qty, Symbol, Ts};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Regime bit-field maintained from external signal events
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegimeFlags(u32);

impl RegimeFlags {
    /// No regime flags set
    pub const NONE: Self = Self(0);
    /// Volatility spike in progress
    pub const HIGH_VOL: Self = Self(1 << 0);
    /// Symbol recently listed
    pub const LISTING_WINDOW: Self = Self(1 << 1);
    /// Positive news flow
    pub const NEWS_POSITIVE: Self = Self(1 << 2);
    /// Negative news flow
    pub const NEWS_NEGATIVE: Self = Self(1 << 3);
    /// Social media hype
    pub const SOCIAL_HYPE: Self = Self(1 << 4);

    /// Raw bits
    #[must_use]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Construct from raw bits
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// All bits of `other` set in `self`
    #[must_use]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set or clear `flag`
    pub fn set(&mut self, flag: Self, on: bool) {
        if on {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }

    /// Whether no flag is set
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RegimeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#07b}", self.0)
    }
}

/// Derived per-symbol metrics over the feature window
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureFrame {
    /// Timestamp of the newest sample in the window
    pub ts: Ts,
    /// Trading symbol
    pub symbol: Symbol,
    /// Mid price
    pub mid: Px,
    /// Microprice (size-weighted mid)
    pub microprice: Px,
    /// Ask minus bid
    pub spread: Px,
    /// Spread relative to mid in basis points
    pub spread_bps: f64,
    /// Best bid size
    pub bid_volume: Qty,
    /// Best ask size
    pub ask_volume: Qty,
    /// Order book imbalance (-1.0 to 1.0)
    pub imbalance: f64,
    /// Standard deviation of consecutive mid returns over the window
    pub realized_vol: f64,
    /// Max mid minus min mid over the window
    pub price_range: Px,
    /// Mid change vs. the previous frame for this symbol
    pub price_change: Px,
    /// Mid change in percent vs. the previous frame
    pub price_change_pct: f64,
    /// Number of samples in the window
    pub window_len: u32,
    /// Regime bits from signal events
    pub regime: RegimeFlags,
}
