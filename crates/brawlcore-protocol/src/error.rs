//! Wire error codes and the protocol layer's own error type.

use serde::{Deserialize, Serialize};

/// A protocol error code, sent as a SCREAMING_SNAKE_CASE string in the
/// payload of `error` envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthRequired,
    AuthFailed,
    SessionExpired,
    LobbyNotFound,
    LobbyFull,
    InvalidState,
    InvalidAction,
    NotYourTurn,
    TurnMismatch,
    ActionTimeout,
    MalformedMessage,
    VersionMismatch,
    InternalError,
    PlayerNotInLobby,
}

impl ErrorCode {
    /// Whether a client can keep its session after receiving this code.
    ///
    /// Clients tear the session down on a non-recoverable error.
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            Self::InvalidState
                | Self::InvalidAction
                | Self::NotYourTurn
                | Self::TurnMismatch
                | Self::MalformedMessage
        )
    }
}

/// The payload of an `error` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub recoverable: bool,
}

impl ErrorPayload {
    /// Creates an error payload; the recoverable flag is derived from the
    /// code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            recoverable: code.is_recoverable(),
        }
    }

    /// Attaches structured details to the payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Errors that can occur in the protocol layer itself.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or a payload
    /// that doesn't match the expected shape for its message type.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
