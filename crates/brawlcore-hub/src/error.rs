//! Error types for the hub layer.

use brawlcore_protocol::ProtocolError;

/// Errors that can occur when handing a message to a connection.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The connection's outbound buffer is full. The peer is stalled;
    /// the hub does not retry — transport-level timeouts will remove the
    /// connection.
    #[error("send buffer full")]
    SendBufferFull,

    /// The connection's outbound buffer has been closed (the connection
    /// was unregistered or is closing).
    #[error("connection closed")]
    ConnectionClosed,

    /// Encoding the envelope failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
