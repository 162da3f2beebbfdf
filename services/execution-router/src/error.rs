//! Venue boundary errors

use common::{RejectReason, VenueCode};
use thiserror::Error;

/// Failure to obtain any report from a venue
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VenueError {
    /// Venue did not answer in time
    #[error("venue {venue} did not respond within {after_ms}ms")]
    Timeout {
        /// Venue
        venue: VenueCode,
        /// Elapsed wait
        after_ms: u64,
    },

    /// Connection lost
    #[error("venue {venue} disconnected")]
    Disconnected {
        /// Venue
        venue: VenueCode,
    },

    /// Order addressed to another venue
    #[error("order for {received} delivered to {expected} adapter")]
    WrongVenue {
        /// Adapter venue
        expected: VenueCode,
        /// Order venue
        received: VenueCode,
    },

    /// Anything else the adapter cannot classify
    #[error("venue {venue} internal error: {reason}")]
    Internal {
        /// Venue
        venue: VenueCode,
        /// Adapter message
        reason: String,
    },
}

impl VenueError {
    /// Reason code published for the affected intent
    #[must_use]
    pub const fn reason(&self) -> RejectReason {
        match self {
            Self::Timeout { .. } => RejectReason::Timeout,
            Self::Disconnected { .. } | Self::WrongVenue { .. } | Self::Internal { .. } => {
                RejectReason::InternalError
            }
        }
    }
}
