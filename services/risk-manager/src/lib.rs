//! Risk Manager Service
//!
//! Deterministic pre-trade checks, in order:
//! - Sanity (quantity, price)
//! - Order notional cap
//! - Resulting position notional cap
//! - Price band against the last approved price
//! - Fixed-window rate limit per symbol
//!
//! The first failing check produces a typed reject with one reason code.
//! State changes only when an intent is approved.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod limits;
pub mod stage;

pub use engine::{PositionState, RateLimitWindow, RiskEngine, RiskVerdict};
pub use limits::{LimitsError, RiskLimits};
pub use stage::RiskStage;
