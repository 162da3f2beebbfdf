//! Decision stage configuration

use serde::{Deserialize, Serialize};

/// Layer indices the pipeline knows about
pub const KNOWN_LAYERS: [u8; 4] = [0, 1, 2, 5];

/// Configuration error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecisionConfigError {
    /// Layer index outside [`KNOWN_LAYERS`]
    #[error("unknown decision layer {0}")]
    UnknownLayer(u8),

    /// Threshold out of range
    #[error("invalid {field}: {value}")]
    InvalidThreshold {
        /// Offending field
        field: &'static str,
        /// Offending value
        value: f64,
    },
}

/// L0 safety bands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SafetyConfig {
    /// Minimum spread in bps
    pub min_spread_bps: f64,
    /// Maximum spread in bps
    pub max_spread_bps: f64,
    /// Minimum mid price
    pub min_price: f64,
    /// Maximum realized volatility
    pub max_realized_vol: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            min_spread_bps: 1.0,
            max_spread_bps: 500.0,
            min_price: 0.0001,
            max_realized_vol: 0.10,
        }
    }
}

/// L1 reflex rule thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReflexConfig {
    /// Imbalance magnitude that triggers mean reversion
    pub imbalance_threshold: f64,
    /// Momentum in percent that triggers trend following
    pub momentum_threshold_pct: f64,
    /// Confidence multiplier when the action adds to existing inventory
    pub inventory_skew_factor: f64,
}

impl Default for ReflexConfig {
    fn default() -> Self {
        Self {
            imbalance_threshold: 0.3,
            momentum_threshold_pct: 0.5,
            inventory_skew_factor: 0.5,
        }
    }
}

/// L2 scorer selection
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScorerConfig {
    /// Keep L1's verdict
    #[default]
    PassThrough,
    /// Scale confidence and penalize volatility
    Linear {
        /// Confidence multiplier
        scale: f64,
        /// Confidence removed per unit of realized volatility
        vol_penalty: f64,
    },
}

/// L5 arbiter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArbiterConfig {
    /// Minimum confidence to trade
    pub min_confidence: f64,
    /// Notional of a full-confidence order
    pub max_order_notional: f64,
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            max_order_notional: 500.0,
        }
    }
}

/// Decision stage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecisionConfig {
    /// Enabled layer indices
    pub enabled_layers: Vec<u8>,
    /// L0
    pub safety: SafetyConfig,
    /// L1
    pub reflex: ReflexConfig,
    /// L2
    pub scorer: ScorerConfig,
    /// L5
    pub arbiter: ArbiterConfig,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            enabled_layers: KNOWN_LAYERS.to_vec(),
            safety: SafetyConfig::default(),
            reflex: ReflexConfig::default(),
            scorer: ScorerConfig::default(),
            arbiter: ArbiterConfig::default(),
        }
    }
}

impl DecisionConfig {
    /// Whether `layer` runs
    #[must_use]
    pub fn is_enabled(&self, layer: u8) -> bool {
        self.enabled_layers.contains(&layer)
    }

    /// Reject unknown layers and nonsensical thresholds
    pub fn validate(&self) -> Result<(), DecisionConfigError> {
        if let Some(&layer) = self.enabled_layers.iter().find(|l| !KNOWN_LAYERS.contains(l)) {
            return Err(DecisionConfigError::UnknownLayer(layer));
        }

        let checks = [
            ("min_spread_bps", self.safety.min_spread_bps),
            ("max_spread_bps", self.safety.max_spread_bps),
            ("min_price", self.safety.min_price),
            ("max_realized_vol", self.safety.max_realized_vol),
            ("imbalance_threshold", self.reflex.imbalance_threshold),
            ("momentum_threshold_pct", self.reflex.momentum_threshold_pct),
            ("inventory_skew_factor", self.reflex.inventory_skew_factor),
            ("min_confidence", self.arbiter.min_confidence),
        ];
        for (field, value) in checks {
            if !value.is_finite() || value < 0.0 {
                return Err(DecisionConfigError::InvalidThreshold { field, value });
            }
        }
        if !(self.arbiter.max_order_notional.is_finite() && self.arbiter.max_order_notional > 0.0) {
            return Err(DecisionConfigError::InvalidThreshold {
                field: "max_order_notional",
                value: self.arbiter.max_order_notional,
            });
        }
        Ok(())
    }
}
