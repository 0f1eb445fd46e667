//! Ephemeral per-lobby ready state.
//!
//! Readiness is deliberately not part of the lobby domain: it is scoped to
//! live connections, cleared per-player on disconnect and per-lobby when a
//! game starts, and never persisted.

use std::collections::HashMap;
use std::sync::RwLock;

/// Tracks which players have signalled ready, per lobby.
#[derive(Debug, Default)]
pub struct ReadyTracker {
    /// lobby code → player id → ready flag.
    state: RwLock<HashMap<String, HashMap<String, bool>>>,
}

impl ReadyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a player's ready flag in a lobby.
    pub fn set_ready(&self, lobby_code: &str, player_id: &str, ready: bool) {
        let mut state = self.state.write().unwrap();
        state
            .entry(lobby_code.to_string())
            .or_default()
            .insert(player_id.to_string(), ready);
    }

    /// Whether a player has signalled ready in a lobby.
    pub fn is_ready(&self, lobby_code: &str, player_id: &str) -> bool {
        let state = self.state.read().unwrap();
        state
            .get(lobby_code)
            .and_then(|lobby| lobby.get(player_id))
            .copied()
            .unwrap_or(false)
    }

    /// Removes a player's entry. An emptied lobby map is removed too — no
    /// dangling lobby keys.
    pub fn clear_player(&self, lobby_code: &str, player_id: &str) {
        let mut state = self.state.write().unwrap();
        if let Some(lobby) = state.get_mut(lobby_code) {
            lobby.remove(player_id);
            if lobby.is_empty() {
                state.remove(lobby_code);
            }
        }
    }

    /// Removes all ready state for a lobby (used when a game starts).
    pub fn clear_lobby(&self, lobby_code: &str) {
        self.state.write().unwrap().remove(lobby_code);
    }

    /// Whether every listed player is ready in the lobby.
    ///
    /// An empty player list is vacuously true.
    pub fn all_ready(&self, lobby_code: &str, player_ids: &[String]) -> bool {
        if player_ids.is_empty() {
            return true;
        }

        let state = self.state.read().unwrap();
        let Some(lobby) = state.get(lobby_code) else {
            return false;
        };
        player_ids
            .iter()
            .all(|id| lobby.get(id).copied().unwrap_or(false))
    }
}
