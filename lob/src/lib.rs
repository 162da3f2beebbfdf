//! Limit order book
//!
//! Cache-friendly fixed-depth arrays per side, one book per symbol, and the
//! sharded stage that turns ticks into deltas and top-of-book snapshots.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod book;
pub mod price_levels;
pub mod stage;

pub use book::{BookError, OrderBook, RECENT_UPDATES, SequenceGap, TickOutcome};
pub use price_levels::{DEPTH, SideBook};
pub use stage::BookStage;
