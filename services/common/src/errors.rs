//! Per-message error taxonomy
//!
//! Handlers return `StageError`; the stage loop only looks at [`ErrorKind`] to
//! pick between dropping the message, backing off, or stopping the stage.

use thiserror::Error;

/// What the stage loop does with a failed message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Drop the message and count it
    DataQuality,
    /// Log, back off, keep going
    Transient,
    /// Stop the stage
    Fatal,
}

impl ErrorKind {
    /// Counter label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DataQuality => "data_quality",
            Self::Transient => "transient",
            Self::Fatal => "fatal",
        }
    }
}

/// Stage handler errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Message payload is unusable
    #[error("invalid {what}: {reason}")]
    InvalidMessage {
        /// Payload kind
        what: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Message arrived on a channel that never carries its kind
    #[error("unexpected {kind} message on {stage} stage")]
    UnexpectedMessage {
        /// Receiving stage
        stage: &'static str,
        /// Message variant
        kind: &'static str,
    },

    /// Message belongs to another shard
    #[error("symbol {symbol} not owned by shard {shard}")]
    WrongShard {
        /// Symbol id
        symbol: u32,
        /// Receiving shard
        shard: u32,
    },

    /// Downstream collaborator temporarily unavailable
    #[error("transient failure: {0}")]
    Transient(String),

    /// Unrecoverable state
    #[error("fatal: {0}")]
    Fatal(String),
}

impl StageError {
    /// Shorthand for an invalid payload
    pub fn invalid(what: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidMessage {
            what,
            reason: reason.into(),
        }
    }

    /// Dispatch class for the stage loop
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMessage { .. } | Self::UnexpectedMessage { .. } | Self::WrongShard { .. } => {
                ErrorKind::DataQuality
            }
            Self::Transient(_) => ErrorKind::Transient,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

/// Result type for stage handlers
pub type StageResult<T> = Result<T, StageError>;
