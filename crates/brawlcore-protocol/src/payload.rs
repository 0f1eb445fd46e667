//! Typed payloads carried inside envelopes, keyed by message type.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Sent by clients to establish identity on a fresh connection.
///
/// `reconnect_token` resumes a prior session: if it validates against the
/// hub's live connection for this player, that connection is evicted before
/// this one is authenticated. `last_seq` tells the server the last message
/// the client observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatePayload {
    pub player_id: String,
    #[serde(default)]
    pub session_token: String,
    pub lobby_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_token: Option<String>,
    #[serde(default)]
    pub last_seq: u64,
}

/// Application-level keep-alive. Transport ping/pong is the primary
/// liveness signal; this exists for clients to measure round-trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartbeatPayload {}

/// Requests the current lobby snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestLobbyStatePayload {}

/// Signals ready (or un-ready) for the game to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetReadyPayload {
    pub ready: bool,
}

/// The kind of a battle action. Reserved — the core answers
/// `submit_action` with `INVALID_STATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Attack,
    Switch,
    Item,
    Forfeit,
}

/// A battle action submission. Reserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitActionPayload {
    pub turn_number: u32,
    pub action_type: ActionType,
    #[serde(default)]
    pub action_data: serde_json::Value,
}

/// Requests a full game snapshot. Reserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestGameStatePayload {
    #[serde(default)]
    pub include_history: bool,
}

/// Requests a rematch after a game ends. Reserved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestRematchPayload {}

/// Leaves the game and lobby.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaveGamePayload {}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// Confirms authentication and hands the client its reconnect credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedPayload {
    pub player_id: String,
    pub reconnect_token: String,
    /// Milliseconds since the Unix epoch.
    pub session_expires_at: i64,
}

/// Acknowledges an application-level heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatAckPayload {
    pub server_time: i64,
}

/// The kind of change a `lobby_updated` broadcast describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyEvent {
    PlayerJoined,
    PlayerLeft,
    PlayerReadyChanged,
    HostChanged,
    StateChanged,
}

/// One player inside a lobby snapshot.
///
/// `is_ready` combines the ready tracker with hub connectivity: a player
/// that set ready and then disconnected reads as not ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyPlayerInfo {
    pub id: String,
    pub username: String,
    pub is_host: bool,
    pub is_ready: bool,
}

/// A lobby snapshot as sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyInfo {
    pub code: String,
    pub state: String,
    pub players: Vec<LobbyPlayerInfo>,
}

/// Notifies clients of a lobby change, carrying the full snapshot plus an
/// event tag and optional event-specific data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyUpdatedPayload {
    pub lobby: LobbyInfo,
    pub event: LobbyEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_data: Option<serde_json::Value>,
}

/// Event data for [`LobbyEvent::PlayerJoined`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoinedEventData {
    pub player_id: String,
    pub username: String,
}

/// Event data for [`LobbyEvent::PlayerLeft`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeftEventData {
    pub player_id: String,
}

/// Event data for [`LobbyEvent::PlayerReadyChanged`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerReadyChangedEventData {
    pub player_id: String,
    pub ready: bool,
}

/// Event data for [`LobbyEvent::HostChanged`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostChangedEventData {
    pub new_host_id: String,
}

/// Announces the pre-game countdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStartingPayload {
    /// Milliseconds since the Unix epoch.
    pub starts_at: i64,
    pub countdown_sec: u32,
}

/// Announces that the game has started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStartedPayload {
    pub game_id: String,
}

/// Notifies the other player of a rematch request. Reserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RematchRequestedPayload {
    pub player_id: String,
}

/// Announces the rematch countdown. Reserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RematchStartingPayload {
    pub starts_at: i64,
    pub countdown_sec: u32,
}

/// Warns a client of an impending server-side disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectWarningPayload {
    pub reason: String,
    pub timeout_at: i64,
}
