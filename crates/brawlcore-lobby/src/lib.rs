//! Lobby domain for Brawlcore.
//!
//! This crate is the pure heart of the matchmaking flow — no I/O, no
//! transport knowledge, just state machines behind locks:
//!
//! 1. **Lobby** ([`Lobby`]) — a room for exactly two players with a
//!    Waiting → Ready → Active lifecycle and host tracking.
//! 2. **Registry** ([`LobbyRegistry`]) — the process-wide map from room
//!    code to lobby, owning code uniqueness and empty-lobby cleanup.
//! 3. **Room codes** ([`generate_room_code`]) — 6 characters over an
//!    alphabet with the ambiguous glyphs removed.
//! 4. **Ready tracker** ([`ReadyTracker`]) — ephemeral per-lobby readiness,
//!    deliberately outside the domain model.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session handler (above)  ← mutates lobbies, reads snapshots
//!     ↕
//! Lobby layer (this crate) ← membership, lifecycle, host rules
//! ```

mod code;
mod error;
mod lobby;
mod ready;
mod registry;

pub use code::{generate_room_code, ROOM_CODE_CHARSET, ROOM_CODE_LENGTH};
pub use error::{LobbyError, RegistryError};
pub use lobby::{Lobby, LobbyState, Player, MAX_PLAYERS};
pub use ready::ReadyTracker;
pub use registry::LobbyRegistry;
