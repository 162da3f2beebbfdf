//! Execution router configuration

use common::{Symbol, SymbolRegistry, VenueCode};
use common::constants::NANOS_PER_MILLI;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default minimum spacing between two orders on one venue
pub const DEFAULT_MIN_INTER_ORDER_DELAY_MS: u64 = 100;

/// Default paper venue fee (0.1%)
pub const DEFAULT_PAPER_FEE_BPS: f64 = 10.0;

/// Router configuration errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouterConfigError {
    /// Routing table names a symbol the registry does not know
    #[error("routing table references unknown symbol {name}")]
    UnknownSymbol {
        /// Symbol name from the table
        name: String,
    },

    /// Venue listed twice
    #[error("venue {venue} configured twice")]
    DuplicateVenue {
        /// Offending venue
        venue: VenueCode,
    },

    /// Fee outside [0, 10000) bps
    #[error("invalid paper venue fee: {fee_bps} bps")]
    InvalidFee {
        /// Offending fee
        fee_bps: f64,
    },
}

/// Preferred venue for one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymbolRoute {
    /// Symbol name as registered
    pub symbol: String,
    /// Venue used when the intent carries no hint
    pub venue: VenueCode,
}

impl SymbolRoute {
    /// Route `symbol` to `venue`
    pub fn new(symbol: impl Into<String>, venue: VenueCode) -> Self {
        Self {
            symbol: symbol.into(),
            venue,
        }
    }
}

/// Router stage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Venues orders may be sent to, in fallback order
    pub venues: Vec<VenueCode>,
    /// Per-symbol preferred venues
    pub routes: Vec<SymbolRoute>,
    /// Minimum delay between two orders routed to the same venue
    pub min_inter_order_delay_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            venues: vec![VenueCode::Binance],
            routes: Vec::new(),
            min_inter_order_delay_ms: DEFAULT_MIN_INTER_ORDER_DELAY_MS,
        }
    }
}

impl RouterConfig {
    /// Throttle interval in nanoseconds
    #[must_use]
    pub const fn min_delay_ns(&self) -> u64 {
        self.min_inter_order_delay_ms.saturating_mul(NANOS_PER_MILLI)
    }

    /// Resolve the routing table's symbol names to ids
    pub fn symbol_table(
        &self,
        registry: &dyn SymbolRegistry,
    ) -> Result<FxHashMap<Symbol, VenueCode>, RouterConfigError> {
        self.routes
            .iter()
            .map(|route| {
                registry
                    .resolve(&route.symbol)
                    .map(|symbol| (symbol, route.venue))
                    .ok_or_else(|| RouterConfigError::UnknownSymbol {
                        name: route.symbol.clone(),
                    })
            })
            .collect()
    }

    /// Check the venue list and the routing table against `registry`
    pub fn validate(&self, registry: &dyn SymbolRegistry) -> Result<(), RouterConfigError> {
        for (i, venue) in self.venues.iter().enumerate() {
            if self.venues[..i].contains(venue) {
                return Err(RouterConfigError::DuplicateVenue { venue: *venue });
            }
        }
        self.symbol_table(registry).map(|_| ())
    }
}

/// Simulated venue settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaperVenueConfig {
    /// Fee charged on fill notional, in basis points
    pub fee_bps: f64,
    /// Submit timeout in milliseconds
    pub submit_timeout_ms: u64,
}

impl Default for PaperVenueConfig {
    fn default() -> Self {
        Self {
            fee_bps: DEFAULT_PAPER_FEE_BPS,
            submit_timeout_ms: 1_000,
        }
    }
}

impl PaperVenueConfig {
    /// Reject negative or absurd fees
    pub fn validate(&self) -> Result<(), RouterConfigError> {
        if !self.fee_bps.is_finite() || !(0.0..10_000.0).contains(&self.fee_bps) {
            return Err(RouterConfigError::InvalidFee { fee_bps: self.fee_bps });
        }
        Ok(())
    }
}
