//! The envelope: the outer structure of every message on the wire.
//!
//! Every message — in both directions — is a JSON object with a `type`
//! discriminator, a protocol `version`, a millisecond `timestamp`, an
//! optional `correlation_id` echoed on directed responses, a sequence
//! number, and an opaque `payload` object typed by `type`.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::ProtocolError;

/// The current protocol version. Envelopes carrying any other version are
/// rejected with a `VERSION_MISMATCH` error.
pub const PROTOCOL_VERSION: u32 = 1;

/// The kind of a protocol message.
///
/// Serialized as the snake_case `type` field of the envelope. The
/// battle-lifecycle kinds (`GameState` through `RematchStarting`) are
/// reserved: the session core declares them but answers their
/// client-initiated counterparts with `INVALID_STATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // -- Client → Server --
    Authenticate,
    Heartbeat,
    RequestLobbyState,
    SetReady,
    SubmitAction,
    RequestGameState,
    RequestRematch,
    LeaveGame,

    // -- Server → Client --
    Authenticated,
    HeartbeatAck,
    LobbyUpdated,
    GameStarting,
    GameStarted,
    GameState,
    ActionAcknowledged,
    TurnResult,
    SwitchRequired,
    GameEnded,
    RematchRequested,
    RematchStarting,
    Error,
    DisconnectWarning,

    /// Any `type` string this server does not know. Dispatch answers these
    /// with `MALFORMED_MESSAGE` instead of failing envelope parsing.
    #[serde(other)]
    Unknown,
}

impl MessageType {
    /// The wire name of this message kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::Heartbeat => "heartbeat",
            Self::RequestLobbyState => "request_lobby_state",
            Self::SetReady => "set_ready",
            Self::SubmitAction => "submit_action",
            Self::RequestGameState => "request_game_state",
            Self::RequestRematch => "request_rematch",
            Self::LeaveGame => "leave_game",
            Self::Authenticated => "authenticated",
            Self::HeartbeatAck => "heartbeat_ack",
            Self::LobbyUpdated => "lobby_updated",
            Self::GameStarting => "game_starting",
            Self::GameStarted => "game_started",
            Self::GameState => "game_state",
            Self::ActionAcknowledged => "action_acknowledged",
            Self::TurnResult => "turn_result",
            Self::SwitchRequired => "switch_required",
            Self::GameEnded => "game_ended",
            Self::RematchRequested => "rematch_requested",
            Self::RematchStarting => "rematch_starting",
            Self::Error => "error",
            Self::DisconnectWarning => "disconnect_warning",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn seq_is_zero(seq: &u64) -> bool {
    *seq == 0
}

/// The standard wrapper for all protocol messages.
///
/// Server-to-client envelopes carry the per-connection monotone `seq`
/// (starting at 1, no gaps). The payload is kept as opaque JSON here;
/// [`Envelope::parse_payload`] turns it into a typed struct once the
/// dispatcher knows the message kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// A missing version reads as 0 and is rejected by the version gate
    /// rather than failing envelope parsing.
    #[serde(default)]
    pub version: u32,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "seq_is_zero")]
    pub seq: u64,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Creates an envelope with the current timestamp and protocol version.
    pub fn new<T: Serialize + ?Sized>(
        kind: MessageType,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            kind,
            version: PROTOCOL_VERSION,
            timestamp: Utc::now().timestamp_millis(),
            correlation_id: None,
            seq: 0,
            payload: serde_json::to_value(payload)
                .map_err(ProtocolError::Encode)?,
        })
    }

    /// Creates an envelope carrying the given sequence number.
    pub fn with_seq<T: Serialize + ?Sized>(
        kind: MessageType,
        seq: u64,
        payload: &T,
    ) -> Result<Self, ProtocolError> {
        let mut envelope = Self::new(kind, payload)?;
        envelope.seq = seq;
        Ok(envelope)
    }

    /// Attaches a correlation ID, consuming and returning the envelope.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Deserializes the opaque payload into a typed struct.
    pub fn parse_payload<T: DeserializeOwned>(
        &self,
    ) -> Result<T, ProtocolError> {
        serde_json::from_value(self.payload.clone())
            .map_err(ProtocolError::Decode)
    }

    /// Serializes the envelope to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }

    /// Parses an envelope from wire bytes.
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

// =========================================================================
// Tests
// =========================================================================
