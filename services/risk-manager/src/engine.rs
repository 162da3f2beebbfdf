//! Pre-trade checks
//!
//! `evaluate` is a pure function of the engine state and the intent; only
//! `commit` mutates, and only approved intents are committed.

use crate::limits::RiskLimits;
use common::{OrderIntent, Px, Qty, RejectReason, Symbol, Ts};
use rustc_hash::FxHashMap;

/// Outcome of a risk check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskVerdict {
    /// Intent may proceed
    Approved,
    /// Intent refused with exactly one reason
    Rejected {
        /// Failed check
        reason: RejectReason,
        /// Human-readable detail
        detail: String,
    },
}

impl RiskVerdict {
    fn reject(reason: RejectReason, detail: String) -> Self {
        Self::Rejected { reason, detail }
    }

    /// Whether the intent passed
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Reason code, `None` on approval
    #[must_use]
    pub fn reason_code(&self) -> Option<u16> {
        match self {
            Self::Approved => None,
            Self::Rejected { reason, .. } => Some(reason.code()),
        }
    }
}

/// Net position and last approved price for one symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionState {
    /// Signed net quantity from approved intents
    pub qty: Qty,
    /// Price of the last approved priced intent
    pub last_price: Option<Px>,
}

/// Fixed rate-limit window for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    /// Window start
    pub start: Ts,
    /// Approvals inside the window
    pub count: u32,
}

impl RateLimitWindow {
    fn expired(&self, now: Ts, window_ns: u64) -> bool {
        now.saturating_since(self.start) >= window_ns
    }

    /// Approvals already counted against `now`
    #[must_use]
    pub fn used(&self, now: Ts, window_ns: u64) -> u32 {
        if self.expired(now, window_ns) { 0 } else { self.count }
    }

    fn record(&mut self, now: Ts, window_ns: u64) {
        if self.expired(now, window_ns) {
            self.start = now;
            self.count = 0;
        }
        self.count += 1;
    }
}

/// Per-symbol position, price and rate state with the checks over it
#[derive(Debug, Clone, PartialEq)]
pub struct RiskEngine {
    limits: RiskLimits,
    order_cap: Px,
    position_cap: Px,
    positions: FxHashMap<Symbol, PositionState>,
    windows: FxHashMap<Symbol, RateLimitWindow>,
}

impl RiskEngine {
    /// Engine with empty state
    #[must_use]
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            order_cap: limits.order_cap(),
            position_cap: limits.position_cap(),
            limits,
            positions: FxHashMap::default(),
            windows: FxHashMap::default(),
        }
    }

    /// Configured limits
    #[must_use]
    pub const fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Position state for `symbol`
    #[must_use]
    pub fn position(&self, symbol: Symbol) -> PositionState {
        self.positions.get(&symbol).copied().unwrap_or_default()
    }

    /// Rate window for `symbol`, if any order was approved
    #[must_use]
    pub fn window(&self, symbol: Symbol) -> Option<RateLimitWindow> {
        self.windows.get(&symbol).copied()
    }

    /// Run every check in order, stopping at the first failure
    #[must_use]
    pub fn evaluate(&self, intent: &OrderIntent) -> RiskVerdict {
        if !intent.qty.is_positive() {
            return RiskVerdict::reject(RejectReason::InvalidQuantity, format!("quantity {} not positive", intent.qty));
        }
        if let Some(price) = intent.price {
            if !price.is_positive() {
                return RiskVerdict::reject(RejectReason::InvalidPrice, format!("price {price} not positive"));
            }
        }

        let position = self.position(intent.symbol);
        if let Some(reference) = intent.price.or(position.last_price) {
            let order_notional = reference.notional(intent.qty);
            if order_notional > self.order_cap {
                return RiskVerdict::reject(
                    RejectReason::PositionLimit,
                    format!("order notional {order_notional} exceeds {}", self.order_cap),
                );
            }

            let resulting = position.qty.saturating_add(intent.qty.signed(intent.side));
            let position_notional = reference.notional(resulting.abs());
            if position_notional > self.position_cap {
                return RiskVerdict::reject(
                    RejectReason::PositionLimit,
                    format!("position notional {position_notional} would exceed {}", self.position_cap),
                );
            }

            if let Some(last) = position.last_price {
                let deviation_pct = (reference.as_f64() - last.as_f64()).abs() / last.as_f64() * 100.0;
                if deviation_pct > self.limits.price_band_pct {
                    return RiskVerdict::reject(
                        RejectReason::PriceBand,
                        format!("price {reference} deviates {deviation_pct:.2}% from last {last}"),
                    );
                }
            }
        }

        let used = self
            .windows
            .get(&intent.symbol)
            .map_or(0, |w| w.used(intent.ts, self.limits.window_ns()));
        if used >= self.limits.max_orders_per_window {
            return RiskVerdict::reject(
                RejectReason::RateLimit,
                format!("{used} orders in current {}ms window", self.limits.window_ms),
            );
        }

        RiskVerdict::Approved
    }

    /// Book an approved intent: position, last price and rate window
    pub fn commit(&mut self, intent: &OrderIntent) {
        let position = self.positions.entry(intent.symbol).or_default();
        position.qty = position.qty.saturating_add(intent.qty.signed(intent.side));
        if let Some(price) = intent.price {
            position.last_price = Some(price);
        }

        let window_ns = self.limits.window_ns();
        self.windows
            .entry(intent.symbol)
            .or_insert(RateLimitWindow {
                start: intent.ts,
                count: 0,
            })
            .record(intent.ts, window_ns);
    }

    /// Evaluate and, on approval, commit
    pub fn check(&mut self, intent: &OrderIntent) -> RiskVerdict {
        let verdict = self.evaluate(intent);
        if verdict.is_approved() {
            self.commit(intent);
        }
        verdict
    }
}
