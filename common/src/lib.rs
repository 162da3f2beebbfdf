//! Common types for the tick-to-trade pipeline
//!
//! Everything that crosses a stage boundary lives here: fixed-point price and
//! quantity types, market data records, feature frames, order flow records and
//! the small collaborator traits (clock, symbol registry) every stage shares.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod constants;
pub mod features;
pub mod market;
pub mod orders;
pub mod registry;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use features::{FeatureFrame, RegimeFlags};
pub use market::{BookDelta, SignalEvent, SignalType, TickUpdate, TopOfBook};
pub use orders::{
    AckStatus, ClientId, Fill, OrderAck, OrderIntent, OrderType, Reject, RejectReason,
    RoutedOrder, SourceStage, TimeInForce, VenueCode,
};
pub use registry::{RegistryError, StaticRegistry, SymbolRegistry};
pub use types::*;
