//! Execution Router Service
//!
//! Two stages sit between risk and the venues:
//! - `RouterStage` picks a venue per approved intent (route hint, symbol
//!   table, first configured venue), throttles each venue to a minimum
//!   inter-order delay and publishes on `routed.<venue>`
//! - `ExecutionStage` hands routed orders to a [`VenueAdapter`] and publishes
//!   the resulting acks, fills and venue rejects
//!
//! [`PaperVenue`] is the built-in adapter: it fills immediately at the limit
//! price and charges a flat fee.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod execution;
pub mod router;
pub mod stage;
pub mod venue;

pub use config::{PaperVenueConfig, RouterConfig, RouterConfigError, SymbolRoute};
pub use error::VenueError;
pub use execution::ExecutionStage;
pub use router::{RouteDecision, SmartRouter};
pub use stage::RouterStage;
pub use venue::{PaperVenue, VenueAdapter, VenueReport};
