//! Swappable wire encoding for envelopes and messages
//!
//! JSON is the default and the replay file format (one message per line).
//! Bincode is the compact binary alternative. Payload records reject unknown
//! fields under both encodings.

use crate::{Message, MessageEnvelope};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use thiserror::Error;

/// Codec errors
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON encode/decode failure
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bincode encode/decode failure
    #[error("bincode codec error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Unknown encoding name
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),
}

/// Wire encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Self-describing JSON
    #[default]
    Json,
    /// Compact binary
    Bincode,
}

impl Encoding {
    fn encode_value<V: Serialize>(self, value: &V) -> Result<Vec<u8>, CodecError> {
        Ok(match self {
            Self::Json => serde_json::to_vec(value)?,
            Self::Bincode => bincode::serialize(value)?,
        })
    }

    fn decode_value<V: DeserializeOwned>(self, bytes: &[u8]) -> Result<V, CodecError> {
        Ok(match self {
            Self::Json => serde_json::from_slice(bytes)?,
            Self::Bincode => bincode::deserialize(bytes)?,
        })
    }

    /// Encode a bare message
    pub fn encode(self, message: &Message) -> Result<Vec<u8>, CodecError> {
        self.encode_value(message)
    }

    /// Decode a bare message
    pub fn decode(self, bytes: &[u8]) -> Result<Message, CodecError> {
        self.decode_value(bytes)
    }

    /// Encode a message with its delivery metadata
    pub fn encode_envelope(self, envelope: &MessageEnvelope<Message>) -> Result<Vec<u8>, CodecError> {
        self.encode_value(envelope)
    }

    /// Decode a message with its delivery metadata
    pub fn decode_envelope(self, bytes: &[u8]) -> Result<MessageEnvelope<Message>, CodecError> {
        self.decode_value(bytes)
    }
}

impl FromStr for Encoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "bincode" => Ok(Self::Bincode),
            other => Err(CodecError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Decode one JSON-lines record, skipping blank lines and `#` comments
pub fn decode_json_line(line: &str) -> Option<Result<Message, CodecError>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(trimmed).map_err(CodecError::from))
}
