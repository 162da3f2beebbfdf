//! Risk limits configuration

use common::Px;
use common::constants::NANOS_PER_MILLI;
use serde::{Deserialize, Serialize};

/// Invalid limit value
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid risk limit {field}: {value}")]
pub struct LimitsError {
    /// Offending field
    pub field: &'static str,
    /// Offending value
    pub value: f64,
}

/// Pre-trade limits, applied per symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskLimits {
    /// Maximum notional of a single order
    pub max_order_notional: f64,
    /// Maximum absolute position notional after the order
    pub max_position_notional: f64,
    /// Maximum deviation from the last approved price, in percent
    pub price_band_pct: f64,
    /// Approvals allowed per rate window
    pub max_orders_per_window: u32,
    /// Rate window length in milliseconds
    pub window_ms: u64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_notional: 500.0,
            max_position_notional: 5_000.0,
            price_band_pct: 5.0,
            max_orders_per_window: 5,
            window_ms: 1_000,
        }
    }
}

impl RiskLimits {
    /// Order cap in fixed point
    #[must_use]
    pub fn order_cap(&self) -> Px {
        Px::new(self.max_order_notional)
    }

    /// Position cap in fixed point
    #[must_use]
    pub fn position_cap(&self) -> Px {
        Px::new(self.max_position_notional)
    }

    /// Rate window in nanoseconds
    #[must_use]
    pub const fn window_ns(&self) -> u64 {
        self.window_ms.saturating_mul(NANOS_PER_MILLI)
    }

    /// Reject caps that would refuse or admit everything by accident
    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self) -> Result<(), LimitsError> {
        let positive = [
            ("max_order_notional", self.max_order_notional),
            ("max_position_notional", self.max_position_notional),
            ("price_band_pct", self.price_band_pct),
            ("max_orders_per_window", f64::from(self.max_orders_per_window)),
            ("window_ms", self.window_ms as f64),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(LimitsError { field, value });
            }
        }
        Ok(())
    }
}
