//! Connection hub for Brawlcore.
//!
//! This crate tracks every live bidirectional session and routes messages
//! to them:
//!
//! 1. **Connection** ([`Connection`]) — one client session: auth state,
//!    identity, per-connection sequence counters, reconnect token, and the
//!    bounded outbound buffer its writer task drains.
//! 2. **Hub** ([`Hub`]) — the registry of connections, indexed by identity
//!    and lobby, with broadcast, targeted send, forced disconnect, and a
//!    disconnect notification hook.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session handler (above)  ← authenticates connections, asks for fan-out
//!     ↕
//! Hub layer (this crate)   ← who is connected, where messages go
//!     ↕
//! Transport (below)        ← pumps draining each connection's buffer
//! ```
//!
//! The hub owns a connection while it is registered; ownership is released
//! on unregister, which also closes the connection's outbound buffer so
//! its writer can shut the transport down.

mod connection;
mod error;
mod hub;

pub use connection::{
    Connection, ConnectionId, ConnectionState, RECONNECT_TOKEN_TTL_SECS,
    SEND_BUFFER_SIZE, SESSION_DURATION_SECS,
};
pub use error::HubError;
pub use hub::Hub;
