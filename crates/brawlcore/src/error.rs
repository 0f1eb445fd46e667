//! Unified error type for the Brawlcore server.

use brawlcore_hub::HubError;
use brawlcore_lobby::{LobbyError, RegistryError};
use brawlcore_protocol::ProtocolError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum BrawlcoreError {
    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lobby domain error (full, invalid state, not found).
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// A registry-level error (unknown code, host gate).
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A hub-level error (buffer full, connection closed).
    #[error(transparent)]
    Hub(#[from] HubError),

    /// An I/O error (bind, accept, serve).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
