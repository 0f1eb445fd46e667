//! `BrawlcoreServer` builder and serve loop.
//!
//! Ties the layers together: registry + hub + session handler (with its
//! disconnect hook) behind the axum router.

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use brawlcore_hub::Hub;
use brawlcore_lobby::LobbyRegistry;

use crate::http::{router, AppState};
use crate::{BrawlcoreError, SessionHandler};

/// Builder for configuring and starting a Brawlcore server.
///
/// # Example
///
/// ```rust,no_run
/// use brawlcore::prelude::*;
///
/// # async fn run() -> Result<(), BrawlcoreError> {
/// let server = BrawlcoreServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct BrawlcoreServerBuilder {
    bind_addr: String,
}

impl BrawlcoreServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Wires the state, binds the listener, and returns a runnable server.
    pub async fn build(self) -> Result<BrawlcoreServer, BrawlcoreError> {
        let registry = Arc::new(LobbyRegistry::new());
        let hub = Hub::new();
        let handler =
            SessionHandler::new(Arc::clone(&hub), Arc::clone(&registry));

        let state = AppState {
            registry,
            hub,
            handler,
        };
        let router = router(state.clone());

        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "brawlcore server listening");

        Ok(BrawlcoreServer {
            listener,
            router,
            state,
        })
    }
}

impl Default for BrawlcoreServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound, ready-to-run Brawlcore server.
pub struct BrawlcoreServer {
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl BrawlcoreServer {
    pub fn builder() -> BrawlcoreServerBuilder {
        BrawlcoreServerBuilder::new()
    }

    /// The local address the server is bound to. Useful with a `:0` bind.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// A handle to the shared state (registry, hub, handler).
    pub fn app_state(&self) -> AppState {
        self.state.clone()
    }

    /// Serves until the process is terminated.
    pub async fn run(self) -> Result<(), BrawlcoreError> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
