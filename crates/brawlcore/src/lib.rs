//! # Brawlcore
//!
//! Server-authoritative session core for a two-player turn-based battle
//! game: lobby lifecycle over REST, a hub of live WebSocket sessions, a
//! versioned JSON protocol with per-connection ordering, and the ready-up
//! handshake that turns a full lobby into a started game.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use brawlcore::prelude::*;
//!
//! # async fn run() -> Result<(), BrawlcoreError> {
//! let server = BrawlcoreServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod http;
mod server;
mod ws;

pub use error::BrawlcoreError;
pub use handler::SessionHandler;
pub use http::{router, AppState};
pub use server::{BrawlcoreServer, BrawlcoreServerBuilder};

/// Re-exports everything needed to embed or drive the server.
pub mod prelude {
    pub use crate::{
        router, AppState, BrawlcoreError, BrawlcoreServer,
        BrawlcoreServerBuilder, SessionHandler,
    };

    pub use brawlcore_hub::{
        Connection, ConnectionId, ConnectionState, Hub, HubError,
    };
    pub use brawlcore_lobby::{
        Lobby, LobbyError, LobbyRegistry, LobbyState, Player, ReadyTracker,
        RegistryError,
    };
    pub use brawlcore_protocol::{
        Envelope, ErrorCode, ErrorPayload, MessageType, ProtocolError,
        PROTOCOL_VERSION,
    };
}
