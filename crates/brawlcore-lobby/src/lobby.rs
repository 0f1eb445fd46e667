//! The lobby state machine: membership, host, lifecycle.
//!
//! A lobby is created with exactly one player (the host) and destroyed by
//! the registry when the last player departs. All mutation goes through a
//! single interior lock, so each operation is atomic with respect to
//! concurrent callers; read accessors return owned snapshots.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::LobbyError;

/// Player slots per lobby. This is a two-player game.
pub const MAX_PLAYERS: usize = 2;

/// A player inside a lobby. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: String,
    pub username: String,
}

/// The lifecycle state of a lobby.
///
/// ```text
/// Waiting ──(join fills)──→ Ready ──(host start)──→ Active
///    ↑                        │
///    └────────(any leave)─────┘
/// ```
///
/// `Active` is terminal with respect to joins; departures from `Active`
/// are permitted but do not transition the state back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyState {
    Waiting,
    Ready,
    Active,
}

impl LobbyState {
    /// The lowercase wire/API name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Ready => "ready",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for LobbyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct LobbyInner {
    state: LobbyState,
    /// Insertion order is meaningful: host reassignment picks the first
    /// remaining player.
    players: Vec<Player>,
    host_id: String,
}

/// A game lobby.
///
/// Cheap accessors (`code`, `max_players`, `created_at`) live outside the
/// lock; everything else is guarded.
#[derive(Debug)]
pub struct Lobby {
    code: String,
    max_players: usize,
    created_at: DateTime<Utc>,
    inner: RwLock<LobbyInner>,
}

impl Lobby {
    /// Creates a lobby with the host as the sole player, in `Waiting`.
    pub fn new(code: &str, host_id: &str, host_username: &str) -> Self {
        Self {
            code: code.to_string(),
            max_players: MAX_PLAYERS,
            created_at: Utc::now(),
            inner: RwLock::new(LobbyInner {
                state: LobbyState::Waiting,
                players: vec![Player {
                    id: host_id.to_string(),
                    username: host_username.to_string(),
                }],
                host_id: host_id.to_string(),
            }),
        }
    }

    /// The lobby's room code. Stored uppercase, compared bytewise.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Adds a player.
    ///
    /// The state check runs before the capacity check: a full lobby sits
    /// at `Ready`, so a late joiner sees [`LobbyError::InvalidStateForJoin`]
    /// rather than [`LobbyError::LobbyFull`]. Callers depend on that exact
    /// error code.
    pub fn add_player(
        &self,
        id: &str,
        username: &str,
    ) -> Result<(), LobbyError> {
        let mut inner = self.inner.write().unwrap();

        if inner.state != LobbyState::Waiting {
            return Err(LobbyError::InvalidStateForJoin);
        }
        if inner.players.iter().any(|p| p.id == id) {
            return Err(LobbyError::AlreadyJoined);
        }
        if inner.players.len() >= self.max_players {
            return Err(LobbyError::LobbyFull);
        }

        inner.players.push(Player {
            id: id.to_string(),
            username: username.to_string(),
        });

        if inner.players.len() == self.max_players {
            inner.state = LobbyState::Ready;
        }

        tracing::info!(
            code = %self.code,
            player_id = %id,
            players = inner.players.len(),
            "player joined lobby"
        );
        Ok(())
    }

    /// Removes a player.
    ///
    /// Dropping below capacity takes a `Ready` lobby back to `Waiting`.
    /// If the host leaves and players remain, the first remaining player
    /// (by insertion order) becomes host.
    pub fn remove_player(&self, id: &str) -> Result<(), LobbyError> {
        let mut inner = self.inner.write().unwrap();

        let position = inner
            .players
            .iter()
            .position(|p| p.id == id)
            .ok_or(LobbyError::PlayerNotFound)?;
        inner.players.remove(position);

        if inner.state == LobbyState::Ready
            && inner.players.len() < self.max_players
        {
            inner.state = LobbyState::Waiting;
        }

        if inner.host_id == id {
            let next_host = inner.players.first().map(|p| p.id.clone());
            if let Some(new_host) = next_host {
                tracing::info!(
                    code = %self.code,
                    %new_host,
                    "host reassigned"
                );
                inner.host_id = new_host;
            }
        }

        tracing::info!(
            code = %self.code,
            player_id = %id,
            players = inner.players.len(),
            "player left lobby"
        );
        Ok(())
    }

    /// Transitions `Ready` → `Active`.
    pub fn start(&self) -> Result<(), LobbyError> {
        let mut inner = self.inner.write().unwrap();

        if inner.state != LobbyState::Ready {
            return Err(LobbyError::InvalidStateForStart);
        }
        if inner.players.len() < self.max_players {
            return Err(LobbyError::NotEnoughPlayers);
        }

        inner.state = LobbyState::Active;
        tracing::info!(code = %self.code, "lobby active");
        Ok(())
    }

    pub fn state(&self) -> LobbyState {
        self.inner.read().unwrap().state
    }

    /// Whether a game can start right now.
    pub fn can_start(&self) -> bool {
        let inner = self.inner.read().unwrap();
        inner.state == LobbyState::Ready
            && inner.players.len() == self.max_players
    }

    pub fn player_count(&self) -> usize {
        self.inner.read().unwrap().players.len()
    }

    pub fn has_player(&self, id: &str) -> bool {
        self.inner
            .read()
            .unwrap()
            .players
            .iter()
            .any(|p| p.id == id)
    }

    pub fn is_host(&self, id: &str) -> bool {
        self.inner.read().unwrap().host_id == id
    }

    /// A snapshot of the players in insertion order.
    pub fn players(&self) -> Vec<Player> {
        self.inner.read().unwrap().players.clone()
    }

    pub fn host_id(&self) -> String {
        self.inner.read().unwrap().host_id.clone()
    }
}

// =========================================================================
// Tests
// =========================================================================
