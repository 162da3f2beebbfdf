//! Decision stage
//!
//! Feature frames pass through a fixed pipeline of toggleable layers:
//!
//! - **L0** safety gate: hard spread, price and volatility bands
//! - **L1** reflex rules: imbalance mean reversion, then momentum
//! - **L2** scoring overlay: pluggable [`Scorer`]
//! - **L5** arbiter: confidence floor, notional sizing at the microprice
//!
//! Fills feed back into per-symbol inventory used by the L1 skew.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod layers;
pub mod scorer;
pub mod stage;

pub use config::{DecisionConfig, DecisionConfigError, ScorerConfig};
pub use engine::{Decision, DecisionEngine};
pub use layers::{Action, DecisionContext, GateFailure, Verdict};
pub use scorer::{LinearScorer, PassThroughScorer, Scorer};
pub use stage::DecisionStage;
