//! Feature stage
//!
//! Keeps a time-bounded window of top-of-book samples per symbol and turns
//! each sample into a [`common::FeatureFrame`]: spread, imbalance, realized
//! volatility, range, momentum against the previous frame, and the regime bits
//! folded in from signal events.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod stage;
pub mod window;

pub use engine::{FeatureConfig, FeatureEngine};
pub use stage::FeatureStage;
pub use window::{FeatureWindow, OutOfOrder};
