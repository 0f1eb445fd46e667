//! The session handler: per-message dispatch for live connections.
//!
//! Every inbound envelope flows through [`SessionHandler::handle_message`]:
//!   1. Version gate — wrong `version` is rejected with VERSION_MISMATCH.
//!   2. Auth gate — everything except `authenticate` requires an Active
//!      connection.
//!   3. Dispatch — mutate lobby/registry state, track readiness, and fan
//!      out broadcasts through the hub.
//!
//! Handlers never write to the socket; they enqueue on the connection's
//! outbound buffer and the write pump does the rest.

use std::sync::{Arc, Weak};

use chrono::Utc;

use brawlcore_hub::{Connection, ConnectionState, Hub};
use brawlcore_lobby::{
    Lobby, LobbyError, LobbyRegistry, LobbyState, ReadyTracker,
    RegistryError,
};
use brawlcore_protocol::{
    AuthenticatePayload, AuthenticatedPayload, Envelope, ErrorCode,
    GameStartedPayload, GameStartingPayload, HeartbeatAckPayload, LobbyEvent,
    LobbyInfo, LobbyPlayerInfo, LobbyUpdatedPayload, MessageType,
    PlayerLeftEventData, PlayerReadyChangedEventData, SetReadyPayload,
    PROTOCOL_VERSION,
};

/// Routes client messages, coordinates ready-up, and triggers game start.
pub struct SessionHandler {
    hub: Arc<Hub>,
    registry: Arc<LobbyRegistry>,
    ready: ReadyTracker,
}

impl SessionHandler {
    /// Creates the handler and wires the hub's disconnect hook to it:
    /// a dropped player loses their ready flag and peers are notified.
    ///
    /// The hook holds a `Weak` back-reference; the hub outliving the
    /// handler just turns the hook into a no-op.
    pub fn new(hub: Arc<Hub>, registry: Arc<LobbyRegistry>) -> Arc<Self> {
        let handler = Arc::new(Self {
            hub,
            registry,
            ready: ReadyTracker::new(),
        });

        let hook: Weak<SessionHandler> = Arc::downgrade(&handler);
        handler.hub.set_on_disconnect(move |player_id, lobby_code| {
            if let Some(handler) = hook.upgrade() {
                handler.on_player_disconnected(player_id, lobby_code);
            }
        });

        handler
    }

    /// Hub disconnect hook: runs after the connection left the indices.
    fn on_player_disconnected(&self, player_id: &str, lobby_code: &str) {
        self.ready.clear_player(lobby_code, player_id);

        if let Ok(lobby) = self.registry.get(lobby_code) {
            self.broadcast_lobby_update(
                &lobby,
                LobbyEvent::PlayerLeft,
                Some(&PlayerLeftEventData {
                    player_id: player_id.to_string(),
                }),
            );
        }

        tracing::info!(player_id, lobby_code, "player disconnected");
    }

    /// Entry point for every parsed inbound envelope.
    pub async fn handle_message(
        &self,
        conn: &Arc<Connection>,
        envelope: Envelope,
    ) {
        let correlation = envelope.correlation_id.as_deref();

        if envelope.version != PROTOCOL_VERSION {
            let _ = conn.send_error(
                ErrorCode::VersionMismatch,
                "Protocol version not supported",
                correlation,
            );
            return;
        }

        match envelope.kind {
            MessageType::Authenticate => {
                self.handle_authenticate(conn, &envelope).await;
            }
            MessageType::Heartbeat => self.handle_heartbeat(conn, &envelope),
            MessageType::RequestLobbyState => {
                self.handle_request_lobby_state(conn, &envelope);
            }
            MessageType::SetReady => self.handle_set_ready(conn, &envelope),

            // Battle lifecycle is reserved; the core stops at game start.
            MessageType::SubmitAction | MessageType::RequestGameState => {
                if self.require_active(conn, &envelope) {
                    let _ = conn.send_error(
                        ErrorCode::InvalidState,
                        "No active battle",
                        correlation,
                    );
                }
            }
            MessageType::RequestRematch => {
                if self.require_active(conn, &envelope) {
                    let _ = conn.send_error(
                        ErrorCode::InvalidState,
                        "No game to rematch",
                        correlation,
                    );
                }
            }

            MessageType::LeaveGame => {
                self.handle_leave_game(conn, &envelope).await;
            }

            _ => {
                let _ = conn.send_error(
                    ErrorCode::MalformedMessage,
                    "Unknown message type",
                    correlation,
                );
            }
        }
    }

    /// The authentication gate: everything but `authenticate` requires an
    /// Active connection. Returns whether dispatch may proceed.
    fn require_active(
        &self,
        conn: &Arc<Connection>,
        envelope: &Envelope,
    ) -> bool {
        if conn.state() == ConnectionState::Active {
            return true;
        }
        let _ = conn.send_error(
            ErrorCode::AuthRequired,
            "Authentication required",
            envelope.correlation_id.as_deref(),
        );
        false
    }

    async fn handle_authenticate(
        &self,
        conn: &Arc<Connection>,
        envelope: &Envelope,
    ) {
        let correlation = envelope.correlation_id.as_deref();

        let payload: AuthenticatePayload = match envelope.parse_payload() {
            Ok(payload) => payload,
            Err(_) => {
                let _ = conn.send_error(
                    ErrorCode::MalformedMessage,
                    "Invalid authenticate payload",
                    correlation,
                );
                return;
            }
        };

        if payload.player_id.is_empty() || payload.lobby_code.is_empty() {
            let _ = conn.send_error(
                ErrorCode::AuthFailed,
                "player_id and lobby_code are required",
                correlation,
            );
            return;
        }

        let lobby = match self.registry.get(&payload.lobby_code) {
            Ok(lobby) => lobby,
            Err(_) => {
                let _ = conn.send_error(
                    ErrorCode::LobbyNotFound,
                    "Lobby not found",
                    correlation,
                );
                return;
            }
        };

        if !lobby.has_player(&payload.player_id) {
            let _ = conn.send_error(
                ErrorCode::PlayerNotInLobby,
                "Player not in lobby",
                correlation,
            );
            return;
        }

        // Every current lobby state accepts connections; the guard keeps
        // the gate explicit for any state added later.
        if !matches!(
            lobby.state(),
            LobbyState::Waiting | LobbyState::Ready | LobbyState::Active
        ) {
            let _ = conn.send_error(
                ErrorCode::InvalidState,
                "Lobby not in valid state for connection",
                correlation,
            );
            return;
        }

        // The session token is trusted here: membership in the lobby is
        // the identity assertion. Binding a real identity provider is an
        // interface point, not core behavior.

        // At most one live session per player. A valid reconnect token
        // resumes the session; with or without one the prior connection
        // is torn down before the new one is associated — the player
        // index is single-valued.
        if let Some(existing) =
            self.hub.connection_by_player(&payload.player_id)
        {
            let resumed = payload
                .reconnect_token
                .as_deref()
                .is_some_and(|token| existing.validate_reconnect_token(token));
            if resumed {
                tracing::info!(
                    player_id = %payload.player_id,
                    "valid reconnect token, replacing prior session"
                );
            } else {
                tracing::info!(
                    player_id = %payload.player_id,
                    "new session displaces prior connection"
                );
            }
            self.hub.unregister(existing).await;
        }

        conn.authenticate(&payload.player_id, &payload.lobby_code);
        self.hub.associate_with_lobby(conn);

        let authenticated = AuthenticatedPayload {
            player_id: payload.player_id.clone(),
            reconnect_token: conn.reconnect_token(),
            session_expires_at: conn.session_expiry().timestamp_millis(),
        };
        let _ = match correlation {
            Some(id) => conn.send_message_with_correlation(
                MessageType::Authenticated,
                id,
                &authenticated,
            ),
            None => {
                conn.send_message(MessageType::Authenticated, &authenticated)
            }
        };

        self.send_lobby_state(conn, &lobby);

        tracing::info!(
            player_id = %payload.player_id,
            lobby = %payload.lobby_code,
            "player authenticated"
        );
    }

    fn handle_heartbeat(&self, conn: &Arc<Connection>, envelope: &Envelope) {
        if !self.require_active(conn, envelope) {
            return;
        }

        conn.update_heartbeat();

        let ack = HeartbeatAckPayload {
            server_time: Utc::now().timestamp_millis(),
        };
        let _ = match envelope.correlation_id.as_deref() {
            Some(id) => conn.send_message_with_correlation(
                MessageType::HeartbeatAck,
                id,
                &ack,
            ),
            None => conn.send_message(MessageType::HeartbeatAck, &ack),
        };
    }

    fn handle_request_lobby_state(
        &self,
        conn: &Arc<Connection>,
        envelope: &Envelope,
    ) {
        if !self.require_active(conn, envelope) {
            return;
        }

        match self.registry.get(&conn.lobby_code()) {
            Ok(lobby) => self.send_lobby_state(conn, &lobby),
            Err(_) => {
                let _ = conn.send_error(
                    ErrorCode::LobbyNotFound,
                    "Lobby not found",
                    envelope.correlation_id.as_deref(),
                );
            }
        }
    }

    fn handle_set_ready(&self, conn: &Arc<Connection>, envelope: &Envelope) {
        if !self.require_active(conn, envelope) {
            return;
        }
        let correlation = envelope.correlation_id.as_deref();

        let payload: SetReadyPayload = match envelope.parse_payload() {
            Ok(payload) => payload,
            Err(_) => {
                let _ = conn.send_error(
                    ErrorCode::MalformedMessage,
                    "Invalid set_ready payload",
                    correlation,
                );
                return;
            }
        };

        let lobby_code = conn.lobby_code();
        let player_id = conn.player_id();

        self.ready.set_ready(&lobby_code, &player_id, payload.ready);

        let lobby = match self.registry.get(&lobby_code) {
            Ok(lobby) => lobby,
            Err(_) => {
                let _ = conn.send_error(
                    ErrorCode::LobbyNotFound,
                    "Lobby not found",
                    correlation,
                );
                return;
            }
        };

        self.broadcast_lobby_update(
            &lobby,
            LobbyEvent::PlayerReadyChanged,
            Some(&PlayerReadyChangedEventData {
                player_id: player_id.clone(),
                ready: payload.ready,
            }),
        );

        self.check_and_start_game(&lobby_code);
    }

    async fn handle_leave_game(
        &self,
        conn: &Arc<Connection>,
        envelope: &Envelope,
    ) {
        if !self.require_active(conn, envelope) {
            return;
        }

        let lobby_code = conn.lobby_code();
        let player_id = conn.player_id();

        self.ready.clear_player(&lobby_code, &player_id);

        if let Err(err) = self.registry.leave(&lobby_code, &player_id) {
            // The player or lobby may already be gone; that is fine.
            let benign = matches!(err, RegistryError::NotFound(_))
                || err.domain() == Some(LobbyError::PlayerNotFound);
            if !benign {
                let _ = conn.send_error(
                    ErrorCode::InternalError,
                    "Failed to leave lobby",
                    envelope.correlation_id.as_deref(),
                );
                return;
            }
        }

        // Notify remaining players, if the lobby survived.
        if let Ok(lobby) = self.registry.get(&lobby_code) {
            self.broadcast_lobby_update(
                &lobby,
                LobbyEvent::PlayerLeft,
                Some(&PlayerLeftEventData {
                    player_id: player_id.clone(),
                }),
            );
        }

        self.hub.unregister(Arc::clone(conn)).await;

        tracing::info!(%player_id, lobby = %lobby_code, "player left game");
    }

    /// Sends the current lobby snapshot to one connection as a
    /// `lobby_updated{state_changed}`.
    fn send_lobby_state(&self, conn: &Arc<Connection>, lobby: &Lobby) {
        let payload = LobbyUpdatedPayload {
            lobby: self.build_lobby_info(lobby),
            event: LobbyEvent::StateChanged,
            event_data: None,
        };
        let _ = conn.send_message(MessageType::LobbyUpdated, &payload);
    }

    /// Broadcasts a lobby snapshot plus event tag to the whole lobby.
    fn broadcast_lobby_update<T: serde::Serialize>(
        &self,
        lobby: &Lobby,
        event: LobbyEvent,
        event_data: Option<&T>,
    ) {
        let payload = LobbyUpdatedPayload {
            lobby: self.build_lobby_info(lobby),
            event,
            event_data: event_data
                .and_then(|data| serde_json::to_value(data).ok()),
        };
        self.hub.broadcast_to_lobby(
            lobby.code(),
            MessageType::LobbyUpdated,
            &payload,
        );
    }

    /// Builds the client-facing snapshot of a lobby.
    ///
    /// A player reads as ready only if they set ready AND currently hold
    /// a live connection — disconnecting implicitly unreadies.
    fn build_lobby_info(&self, lobby: &Lobby) -> LobbyInfo {
        let host_id = lobby.host_id();
        let players = lobby
            .players()
            .into_iter()
            .map(|player| LobbyPlayerInfo {
                is_host: player.id == host_id,
                is_ready: self.ready.is_ready(lobby.code(), &player.id)
                    && self.hub.is_player_connected(&player.id),
                id: player.id,
                username: player.username,
            })
            .collect();

        LobbyInfo {
            code: lobby.code().to_string(),
            state: lobby.state().to_string(),
            players,
        }
    }

    /// The start predicate: a full lobby, every slot connected, and every
    /// player ready-and-connected. When it holds, the start sequence goes
    /// out (`game_starting` then `game_started`) and the lobby's ready
    /// state is cleared.
    ///
    /// This path does not drive the domain lobby to Active; host-initiated
    /// HTTP start is an independent entry point.
    fn check_and_start_game(&self, lobby_code: &str) {
        let Ok(lobby) = self.registry.get(lobby_code) else {
            return;
        };

        let players = lobby.players();
        if players.len() != lobby.max_players() {
            return;
        }
        if self.hub.lobby_connection_count(lobby_code) != lobby.max_players()
        {
            return;
        }
        let player_ids: Vec<String> =
            players.into_iter().map(|player| player.id).collect();
        if !self.ready.all_ready(lobby_code, &player_ids) {
            return;
        }
        if !player_ids
            .iter()
            .all(|id| self.hub.is_player_connected(id))
        {
            return;
        }

        self.broadcast_game_starting(lobby_code, 0);
        self.broadcast_game_started(lobby_code);
        self.ready.clear_lobby(lobby_code);

        tracing::info!(lobby = %lobby_code, "game start sequence broadcast");
    }

    fn broadcast_game_starting(&self, lobby_code: &str, countdown_sec: u32) {
        let starts_at = (Utc::now()
            + chrono::Duration::seconds(i64::from(countdown_sec)))
        .timestamp_millis();
        let payload = GameStartingPayload {
            starts_at,
            countdown_sec,
        };
        self.hub.broadcast_to_lobby(
            lobby_code,
            MessageType::GameStarting,
            &payload,
        );
    }

    fn broadcast_game_started(&self, lobby_code: &str) {
        // The lobby code doubles as the game ID until the battle engine
        // exists.
        let payload = GameStartedPayload {
            game_id: lobby_code.to_string(),
        };
        self.hub.broadcast_to_lobby(
            lobby_code,
            MessageType::GameStarted,
            &payload,
        );
    }

    /// Whether a player has a live entry in the ready tracker. Exposed
    /// for wiring-level tests; snapshots additionally require the player
    /// to be connected.
    pub fn is_player_ready(&self, lobby_code: &str, player_id: &str) -> bool {
        self.ready.is_ready(lobby_code, player_id)
    }
}
