//! Test utilities and fixtures for the tick-to-trade pipeline
//!
//! - Factories for ticks, top-of-book snapshots, feature frames and intents
//! - rstest fixtures for buses, clocks and registries
//! - Async receive helpers with timeouts
//! - Approximate-equality assertions for statistical features

pub mod assertions;
pub mod factories;
pub mod fixtures;
pub mod helpers;

pub use assertions::*;
pub use factories::*;
pub use fixtures::*;
pub use helpers::*;
