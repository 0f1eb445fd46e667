//! The lobby registry: the process-wide map from room code to lobby.
//!
//! # Locking discipline
//!
//! The registry lock guards insert/delete/lookup; each lobby's own lock
//! guards per-lobby mutation. Lookups release the registry lock before
//! delegating into the lobby — except `leave`, which holds the registry
//! write lock for the whole operation so that "remove player and
//! delete-if-empty" is atomic.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::{generate_room_code, Lobby, RegistryError};

/// Tracks all live lobbies, keyed by room code.
#[derive(Debug, Default)]
pub struct LobbyRegistry {
    lobbies: RwLock<HashMap<String, Arc<Lobby>>>,
}

impl LobbyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a lobby with a freshly generated unique code.
    ///
    /// Codes are rejection-sampled against the registry under the write
    /// lock, so two concurrent creates can never share a code.
    pub fn create(&self, host_id: &str, host_username: &str) -> Arc<Lobby> {
        let mut lobbies = self.lobbies.write().unwrap();

        let code = loop {
            let candidate = generate_room_code();
            if !lobbies.contains_key(&candidate) {
                break candidate;
            }
        };

        let lobby = Arc::new(Lobby::new(&code, host_id, host_username));
        lobbies.insert(code, Arc::clone(&lobby));

        tracing::info!(code = %lobby.code(), host_id, "lobby created");
        lobby
    }

    /// Adds a player to an existing lobby.
    pub fn join(
        &self,
        code: &str,
        player_id: &str,
        username: &str,
    ) -> Result<Arc<Lobby>, RegistryError> {
        let lobby = self.get(code)?;
        lobby.add_player(player_id, username).map_err(|source| {
            RegistryError::Lobby {
                code: code.to_string(),
                player: player_id.to_string(),
                source,
            }
        })?;
        Ok(lobby)
    }

    /// Removes a player from a lobby, deleting the lobby if it empties.
    ///
    /// The empty lobby is not a representable external state: both steps
    /// happen under the registry write lock.
    pub fn leave(
        &self,
        code: &str,
        player_id: &str,
    ) -> Result<(), RegistryError> {
        let mut lobbies = self.lobbies.write().unwrap();

        let lobby = lobbies
            .get(code)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(code.to_string()))?;

        lobby.remove_player(player_id).map_err(|source| {
            RegistryError::Lobby {
                code: code.to_string(),
                player: player_id.to_string(),
                source,
            }
        })?;

        if lobby.player_count() == 0 {
            lobbies.remove(code);
            tracing::info!(code, "empty lobby removed");
        }

        Ok(())
    }

    /// Looks up a lobby by code.
    pub fn get(&self, code: &str) -> Result<Arc<Lobby>, RegistryError> {
        self.lobbies
            .read()
            .unwrap()
            .get(code)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(code.to_string()))
    }

    /// A snapshot of all live lobbies.
    pub fn list(&self) -> Vec<Arc<Lobby>> {
        self.lobbies.read().unwrap().values().cloned().collect()
    }

    /// Starts the game in a lobby. Only the host may do this.
    pub fn start_game(
        &self,
        code: &str,
        caller_id: &str,
    ) -> Result<(), RegistryError> {
        let lobby = self.get(code)?;

        if !lobby.is_host(caller_id) {
            return Err(RegistryError::NotHost {
                code: code.to_string(),
                player: caller_id.to_string(),
            });
        }

        lobby.start().map_err(|source| RegistryError::Lobby {
            code: code.to_string(),
            player: caller_id.to_string(),
            source,
        })?;

        tracing::info!(code, caller_id, "game started by host");
        Ok(())
    }

    /// The number of live lobbies.
    pub fn len(&self) -> usize {
        self.lobbies.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.read().unwrap().is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
