//! Error types for the lobby layer.

/// Errors produced by the lobby state machine itself.
///
/// These are sentinel values: higher layers match on them to pick HTTP
/// status codes and protocol error codes, so the set is part of the
/// observable contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// The lobby has no free player slots.
    #[error("lobby is full")]
    LobbyFull,

    /// The player ID is already present in the lobby.
    #[error("player already in lobby")]
    AlreadyJoined,

    /// The player ID is not present in the lobby.
    #[error("player not found in lobby")]
    PlayerNotFound,

    /// The lobby is not in a state that accepts joins. A full lobby
    /// reports this (not [`LobbyError::LobbyFull`]) because the state
    /// check runs before the capacity check.
    #[error("cannot join lobby in current state")]
    InvalidStateForJoin,

    /// The lobby is not in a state that can start a game.
    #[error("cannot start lobby in current state")]
    InvalidStateForStart,

    /// The lobby has fewer players than a game requires.
    #[error("not enough players to start")]
    NotEnoughPlayers,
}

/// Errors produced by the registry, wrapping domain errors with the lobby
/// and player they occurred for.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No lobby is registered under this code.
    #[error("lobby {0:?}: lobby not found")]
    NotFound(String),

    /// A non-host player tried to start the game.
    #[error("lobby {code:?}, player {player:?}: only host can start the game")]
    NotHost { code: String, player: String },

    /// A lobby operation failed; carries the code/player context.
    #[error("lobby {code:?}, player {player:?}: {source}")]
    Lobby {
        code: String,
        player: String,
        #[source]
        source: LobbyError,
    },
}

impl RegistryError {
    /// The underlying domain error, if this wraps one. Used by the HTTP
    /// and protocol layers to sentinel-match for status mapping.
    pub fn domain(&self) -> Option<LobbyError> {
        match self {
            Self::Lobby { source, .. } => Some(*source),
            _ => None,
        }
    }
}
