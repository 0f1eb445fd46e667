//! Wire protocol for Brawlcore.
//!
//! This crate defines the "language" that clients and servers speak:
//!
//! - **Envelope** ([`Envelope`], [`MessageType`]) — the outer structure of
//!   every message on the wire, carrying version, timestamp, sequence
//!   number, and an optional correlation ID.
//! - **Payloads** ([`AuthenticatePayload`], [`LobbyUpdatedPayload`], etc.)
//!   — the typed contents carried inside an envelope, keyed by message type.
//! - **Errors** ([`ErrorCode`], [`ErrorPayload`], [`ProtocolError`]) — wire
//!   error codes with their recoverability contract, and what can go wrong
//!   during encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the session
//! handler (player context). It doesn't know about connections or lobbies —
//! it only knows how messages are shaped and serialized.
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Session handler (dispatch)
//! ```

mod envelope;
mod error;
mod payload;

pub use envelope::{Envelope, MessageType, PROTOCOL_VERSION};
pub use error::{ErrorCode, ErrorPayload, ProtocolError};
pub use payload::{
    ActionType, AuthenticatePayload, AuthenticatedPayload,
    DisconnectWarningPayload, GameStartedPayload, GameStartingPayload,
    HeartbeatAckPayload, HeartbeatPayload, HostChangedEventData,
    LeaveGamePayload, LobbyEvent, LobbyInfo, LobbyPlayerInfo,
    LobbyUpdatedPayload, PlayerJoinedEventData, PlayerLeftEventData,
    PlayerReadyChangedEventData, RematchRequestedPayload,
    RematchStartingPayload, RequestGameStatePayload,
    RequestLobbyStatePayload, RequestRematchPayload, SetReadyPayload,
    SubmitActionPayload,
};
