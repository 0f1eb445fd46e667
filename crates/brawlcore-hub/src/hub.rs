//! The hub: registry of live connections and lobby fan-out.
//!
//! Index writes for registration and unregistration are serialized through
//! a single coordinator task fed by two channels, which gives a strict
//! happens-before between a register and any later read of the indices.
//! Association (post-auth) and all read paths take the index lock
//! directly.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use brawlcore_protocol::{ErrorCode, MessageType};

use crate::{Connection, ConnectionId, ConnectionState, HubError};

/// Invoked after an authenticated player's connection has been removed
/// from the indices, with `(player_id, lobby_code)`. Always called outside
/// the index lock, so it may call back into the hub.
type DisconnectCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Default)]
struct Indices {
    /// Every registered connection, authenticated or not.
    connections: HashMap<ConnectionId, Arc<Connection>>,
    /// Connections grouped by lobby code.
    lobbies: HashMap<String, HashMap<ConnectionId, Arc<Connection>>>,
    /// At most one connection per player ID; a later authentication for
    /// the same player displaces the entry.
    players: HashMap<String, Arc<Connection>>,
}

/// The registry of live sessions.
pub struct Hub {
    indices: RwLock<Indices>,
    register_tx: mpsc::Sender<Arc<Connection>>,
    unregister_tx: mpsc::Sender<Arc<Connection>>,
    on_disconnect: RwLock<Option<DisconnectCallback>>,
}

impl Hub {
    /// Creates the hub and spawns its coordinator task. The coordinator
    /// exits when the last handle to the hub is dropped.
    pub fn new() -> Arc<Self> {
        let (register_tx, mut register_rx) = mpsc::channel(1);
        let (unregister_tx, mut unregister_rx) = mpsc::channel(1);

        let hub = Arc::new(Self {
            indices: RwLock::new(Indices::default()),
            register_tx,
            unregister_tx,
            on_disconnect: RwLock::new(None),
        });

        let coordinator = Arc::downgrade(&hub);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    conn = register_rx.recv() => conn.map(|c| (c, true)),
                    conn = unregister_rx.recv() => conn.map(|c| (c, false)),
                };
                let Some((conn, is_register)) = event else { break };
                let Some(hub) = coordinator.upgrade() else { break };
                if is_register {
                    hub.handle_register(conn);
                } else {
                    hub.handle_unregister(conn);
                }
            }
            tracing::debug!("hub coordinator stopped");
        });

        hub
    }

    /// Sets the hook invoked when an authenticated connection is removed.
    pub fn set_on_disconnect(
        &self,
        callback: impl Fn(&str, &str) + Send + Sync + 'static,
    ) {
        *self.on_disconnect.write().unwrap() = Some(Arc::new(callback));
    }

    /// Submits a connection for registration. The connection is still
    /// pending (pre-auth) at this point.
    pub async fn register(&self, conn: Arc<Connection>) {
        let _ = self.register_tx.send(conn).await;
    }

    /// Submits a connection for removal from all indices. Idempotent.
    pub async fn unregister(&self, conn: Arc<Connection>) {
        let _ = self.unregister_tx.send(conn).await;
    }

    fn handle_register(&self, conn: Arc<Connection>) {
        let id = conn.id();
        self.indices.write().unwrap().connections.insert(id, conn);
        tracing::debug!(%id, "connection registered");
    }

    fn handle_unregister(&self, conn: Arc<Connection>) {
        let id = conn.id();
        let (player_id, lobby_code, callback) = {
            let mut indices = self.indices.write().unwrap();

            if indices.connections.remove(&id).is_none() {
                // Already unregistered (e.g. displaced and then its read
                // pump terminated).
                return;
            }

            let lobby_code = conn.lobby_code();
            if !lobby_code.is_empty() {
                if let Some(lobby) = indices.lobbies.get_mut(&lobby_code) {
                    lobby.remove(&id);
                    if lobby.is_empty() {
                        indices.lobbies.remove(&lobby_code);
                    }
                }
            }

            // Only remove the player entry if it still points at *this*
            // connection — a rapid re-authentication by the same player
            // must not be clobbered.
            let player_id = conn.player_id();
            if !player_id.is_empty()
                && indices
                    .players
                    .get(&player_id)
                    .is_some_and(|c| c.id() == id)
            {
                indices.players.remove(&player_id);
            }

            // Capture the callback before releasing the lock; invoke it
            // after, so it can re-enter the hub without deadlocking.
            (player_id, lobby_code, self.on_disconnect.read().unwrap().clone())
        };

        if let Some(callback) = callback {
            if !player_id.is_empty() && !lobby_code.is_empty() {
                callback(&player_id, &lobby_code);
            }
        }

        conn.close();
        tracing::debug!(%id, "connection unregistered");
    }

    /// Inserts an authenticated connection into the lobby and player
    /// indices. A pre-existing player entry is overwritten; the caller is
    /// responsible for unregistering the old connection first.
    pub fn associate_with_lobby(&self, conn: &Arc<Connection>) {
        let lobby_code = conn.lobby_code();
        let player_id = conn.player_id();
        if lobby_code.is_empty() || player_id.is_empty() {
            return;
        }

        let mut indices = self.indices.write().unwrap();
        indices
            .lobbies
            .entry(lobby_code)
            .or_default()
            .insert(conn.id(), Arc::clone(conn));
        indices.players.insert(player_id, Arc::clone(conn));
    }

    /// Sends a message to every active connection in a lobby.
    ///
    /// The envelope is constructed and marshaled per connection: each
    /// recipient has its own seq counter, so sharing encoded bytes across
    /// recipients would corrupt their ordering contract.
    pub fn broadcast_to_lobby<T: serde::Serialize + ?Sized>(
        &self,
        lobby_code: &str,
        kind: MessageType,
        payload: &T,
    ) {
        for conn in self.lobby_connections(lobby_code) {
            if conn.state() == ConnectionState::Active {
                if let Err(err) = conn.send_message(kind, payload) {
                    tracing::warn!(
                        id = %conn.id(),
                        %kind,
                        error = %err,
                        "dropping broadcast for stalled connection"
                    );
                }
            }
        }
    }

    /// As [`broadcast_to_lobby`](Self::broadcast_to_lobby), skipping the
    /// named player.
    pub fn broadcast_to_lobby_except<T: serde::Serialize + ?Sized>(
        &self,
        lobby_code: &str,
        except_player_id: &str,
        kind: MessageType,
        payload: &T,
    ) {
        for conn in self.lobby_connections(lobby_code) {
            if conn.state() == ConnectionState::Active
                && conn.player_id() != except_player_id
            {
                if let Err(err) = conn.send_message(kind, payload) {
                    tracing::warn!(
                        id = %conn.id(),
                        %kind,
                        error = %err,
                        "dropping broadcast for stalled connection"
                    );
                }
            }
        }
    }

    /// Sends a message to one player. A player with no live connection is
    /// a no-op, not an error.
    pub fn send_to_player<T: serde::Serialize + ?Sized>(
        &self,
        player_id: &str,
        kind: MessageType,
        payload: &T,
    ) -> Result<(), HubError> {
        match self.connection_by_player(player_id) {
            Some(conn) => conn.send_message(kind, payload),
            None => Ok(()),
        }
    }

    /// As [`send_to_player`](Self::send_to_player), preserving a
    /// correlation ID on the outbound envelope.
    pub fn send_to_player_with_correlation<T: serde::Serialize + ?Sized>(
        &self,
        player_id: &str,
        kind: MessageType,
        correlation_id: &str,
        payload: &T,
    ) -> Result<(), HubError> {
        match self.connection_by_player(player_id) {
            Some(conn) => {
                conn.send_message_with_correlation(kind, correlation_id, payload)
            }
            None => Ok(()),
        }
    }

    /// Sends an `error` envelope to one player.
    pub fn send_error_to_player(
        &self,
        player_id: &str,
        code: ErrorCode,
        message: &str,
        correlation_id: Option<&str>,
    ) -> Result<(), HubError> {
        match self.connection_by_player(player_id) {
            Some(conn) => conn.send_error(code, message, correlation_id),
            None => Ok(()),
        }
    }

    /// Forcefully disconnects a player's live connection, if any.
    pub async fn disconnect_player(&self, player_id: &str) {
        if let Some(conn) = self.connection_by_player(player_id) {
            self.unregister(conn).await;
        }
    }

    /// The player's live connection, if any.
    pub fn connection_by_player(
        &self,
        player_id: &str,
    ) -> Option<Arc<Connection>> {
        self.indices.read().unwrap().players.get(player_id).cloned()
    }

    /// A snapshot of the connections in a lobby.
    pub fn lobby_connections(&self, lobby_code: &str) -> Vec<Arc<Connection>> {
        self.indices
            .read()
            .unwrap()
            .lobbies
            .get(lobby_code)
            .map(|lobby| lobby.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total registered connections, authenticated or not.
    pub fn connection_count(&self) -> usize {
        self.indices.read().unwrap().connections.len()
    }

    /// Connections associated with a lobby.
    pub fn lobby_connection_count(&self, lobby_code: &str) -> usize {
        self.indices
            .read()
            .unwrap()
            .lobbies
            .get(lobby_code)
            .map_or(0, HashMap::len)
    }

    /// Whether a player has a live connection.
    pub fn is_player_connected(&self, player_id: &str) -> bool {
        self.indices.read().unwrap().players.contains_key(player_id)
    }
}

// =========================================================================
// Tests
// =========================================================================
