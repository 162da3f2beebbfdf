//! Per-symbol feature computation

use crate::window::{FeatureWindow, OutOfOrder};
use common::constants::NANOS_PER_MILLI;
use common::{FeatureFrame, Px, RegimeFlags, SignalEvent, SignalType, Symbol, TopOfBook};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Feature stage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureConfig {
    /// Window span in milliseconds
    pub window_ms: u64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { window_ms: 500 }
    }
}

impl FeatureConfig {
    /// Window span in nanoseconds
    #[must_use]
    pub const fn window_ns(&self) -> u64 {
        self.window_ms.saturating_mul(NANOS_PER_MILLI)
    }
}

#[derive(Debug)]
struct SymbolState {
    window: FeatureWindow,
    last_mid: Option<Px>,
}

/// Rolling features and regime bits for every symbol seen
#[derive(Debug)]
pub struct FeatureEngine {
    config: FeatureConfig,
    symbols: FxHashMap<Symbol, SymbolState>,
    regimes: FxHashMap<Symbol, RegimeFlags>,
}

impl FeatureEngine {
    /// Engine with the given window
    #[must_use]
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            symbols: FxHashMap::default(),
            regimes: FxHashMap::default(),
        }
    }

    /// Fold one top-of-book sample into the symbol's window and derive a frame
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply(&mut self, top: &TopOfBook) -> Result<FeatureFrame, OutOfOrder> {
        let span_ns = self.config.window_ns();
        let regime = self.regime(top.symbol);
        let state = self.symbols.entry(top.symbol).or_insert_with(|| SymbolState {
            window: FeatureWindow::new(span_ns),
            last_mid: None,
        });
        state.window.push(*top)?;

        let mid = top.mid();
        let (price_change, price_change_pct) = match state.last_mid {
            Some(prev) if prev.is_positive() => {
                let change = Px::from_i64(mid.as_i64() - prev.as_i64());
                (change, change.as_f64() / prev.as_f64() * 100.0)
            }
            Some(prev) => (Px::from_i64(mid.as_i64() - prev.as_i64()), 0.0),
            None => (Px::ZERO, 0.0),
        };
        state.last_mid = Some(mid);

        Ok(FeatureFrame {
            ts: top.ts,
            symbol: top.symbol,
            mid,
            microprice: top.microprice(),
            spread: top.spread(),
            spread_bps: top.spread_bps(),
            bid_volume: top.bid_size,
            ask_volume: top.ask_size,
            imbalance: top.imbalance(),
            realized_vol: state.window.realized_vol(),
            price_range: state.window.price_range(),
            price_change,
            price_change_pct,
            window_len: u32::try_from(state.window.len()).unwrap_or(u32::MAX),
            regime,
        })
    }

    /// Fold a signal into the symbol's regime bits, returning the new bits
    pub fn apply_signal(&mut self, signal: &SignalEvent) -> RegimeFlags {
        let regime = self.regimes.entry(signal.symbol).or_default();
        let on = signal.value > 0.0;
        match signal.sig_type {
            SignalType::Vol => regime.set(RegimeFlags::HIGH_VOL, on),
            SignalType::Listing => regime.set(RegimeFlags::LISTING_WINDOW, on),
            SignalType::Social => regime.set(RegimeFlags::SOCIAL_HYPE, on),
            SignalType::News => {
                regime.set(RegimeFlags::NEWS_POSITIVE, on);
                regime.set(RegimeFlags::NEWS_NEGATIVE, signal.value < 0.0);
            }
            SignalType::Custom => {}
        }
        *regime
    }

    /// Current regime bits for `symbol`
    #[must_use]
    pub fn regime(&self, symbol: Symbol) -> RegimeFlags {
        self.regimes.get(&symbol).copied().unwrap_or_default()
    }

    /// Samples currently in `symbol`'s window
    #[must_use]
    pub fn window_len(&self, symbol: Symbol) -> usize {
        self.symbols.get(&symbol).map_or(0, |s| s.window.len())
    }
}
