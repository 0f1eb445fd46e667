//! A single bidirectional session: identity, ordering, and the outbound
//! buffer.
//!
//! The connection is transport-agnostic. Producers (the session handler
//! and the hub's broadcast loops) enqueue ready-to-write frames on a
//! bounded channel; a writer task owned by the transport layer drains it
//! in order. Sequence allocation and enqueueing happen under one lock, so
//! the per-connection `seq` a client observes is strictly increasing and
//! gap-free in delivery order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use brawlcore_protocol::{Envelope, ErrorCode, ErrorPayload, MessageType};

use crate::HubError;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Capacity of the outbound buffer. A full buffer means the peer has
/// stalled; enqueue attempts then fail with
/// [`HubError::SendBufferFull`].
pub const SEND_BUFFER_SIZE: usize = 256;

/// How long a session stays valid after authentication.
pub const SESSION_DURATION_SECS: i64 = 24 * 60 * 60;

/// How long a reconnect token stays acceptable after being issued.
pub const RECONNECT_TOKEN_TTL_SECS: i64 = 5 * 60;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted but not authenticated yet.
    Pending,
    /// Authenticated and ready.
    Active,
    /// About to close; the outbound buffer is gone.
    Closing,
}

#[derive(Debug)]
struct ConnectionInner {
    state: ConnectionState,
    /// Set at authentication; empty before.
    player_id: String,
    lobby_code: String,
    /// Sequence number of the last outbound message. The first message a
    /// client sees carries seq = 1.
    outbound_seq: u64,
    /// Highest sequence number received from this client. Never regresses.
    last_received_seq: u64,
    reconnect_token: String,
    token_expiry: DateTime<Utc>,
    session_expiry: DateTime<Utc>,
    last_heartbeat: DateTime<Utc>,
    /// Dropped on close to signal the writer that the buffer is done.
    sender: Option<mpsc::Sender<Vec<u8>>>,
}

/// One live client session.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    inner: RwLock<ConnectionInner>,
}

impl Connection {
    /// Creates a pending connection and hands back the receiving end of
    /// its outbound buffer for the writer task to drain.
    pub fn new() -> (Arc<Self>, mpsc::Receiver<Vec<u8>>) {
        let (sender, receiver) = mpsc::channel(SEND_BUFFER_SIZE);
        let now = Utc::now();
        let conn = Arc::new(Self {
            id: ConnectionId::next(),
            inner: RwLock::new(ConnectionInner {
                state: ConnectionState::Pending,
                player_id: String::new(),
                lobby_code: String::new(),
                outbound_seq: 0,
                last_received_seq: 0,
                reconnect_token: String::new(),
                token_expiry: now,
                session_expiry: now,
                last_heartbeat: now,
                sender: Some(sender),
            }),
        });
        (conn, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.read().unwrap().state
    }

    /// The player bound to this connection; empty before authentication.
    pub fn player_id(&self) -> String {
        self.inner.read().unwrap().player_id.clone()
    }

    /// The lobby bound to this connection; empty before authentication.
    pub fn lobby_code(&self) -> String {
        self.inner.read().unwrap().lobby_code.clone()
    }

    /// Binds identity after successful authentication: sets the player and
    /// lobby, flips the state to Active, and issues a fresh reconnect
    /// token with its expiry windows.
    pub fn authenticate(&self, player_id: &str, lobby_code: &str) {
        let mut inner = self.inner.write().unwrap();
        let now = Utc::now();
        inner.player_id = player_id.to_string();
        inner.lobby_code = lobby_code.to_string();
        inner.state = ConnectionState::Active;
        inner.reconnect_token = generate_reconnect_token();
        inner.token_expiry =
            now + Duration::seconds(RECONNECT_TOKEN_TTL_SECS);
        inner.session_expiry =
            now + Duration::seconds(SESSION_DURATION_SECS);
    }

    pub fn reconnect_token(&self) -> String {
        self.inner.read().unwrap().reconnect_token.clone()
    }

    pub fn session_expiry(&self) -> DateTime<Utc> {
        self.inner.read().unwrap().session_expiry
    }

    /// Whether a presented reconnect token matches the one issued to this
    /// connection and both the token window and the session are still
    /// open.
    pub fn validate_reconnect_token(&self, token: &str) -> bool {
        let inner = self.inner.read().unwrap();
        let now = Utc::now();
        !inner.reconnect_token.is_empty()
            && inner.reconnect_token == token
            && now < inner.token_expiry
            && now < inner.session_expiry
    }

    /// The sequence number of the most recent outbound message.
    pub fn current_seq(&self) -> u64 {
        self.inner.read().unwrap().outbound_seq
    }

    /// Records an inbound sequence number; the counter never regresses.
    pub fn update_last_received_seq(&self, seq: u64) {
        let mut inner = self.inner.write().unwrap();
        if seq > inner.last_received_seq {
            inner.last_received_seq = seq;
        }
    }

    pub fn last_received_seq(&self) -> u64 {
        self.inner.read().unwrap().last_received_seq
    }

    pub fn update_heartbeat(&self) {
        self.inner.write().unwrap().last_heartbeat = Utc::now();
    }

    pub fn last_heartbeat(&self) -> DateTime<Utc> {
        self.inner.read().unwrap().last_heartbeat
    }

    /// Enqueues a message for this client with the next sequence number.
    pub fn send_message<T: serde::Serialize + ?Sized>(
        &self,
        kind: MessageType,
        payload: &T,
    ) -> Result<(), HubError> {
        self.enqueue(kind, None, payload)
    }

    /// As [`send_message`](Self::send_message), echoing a caller-supplied
    /// correlation ID on the envelope.
    pub fn send_message_with_correlation<T: serde::Serialize + ?Sized>(
        &self,
        kind: MessageType,
        correlation_id: &str,
        payload: &T,
    ) -> Result<(), HubError> {
        self.enqueue(kind, Some(correlation_id), payload)
    }

    /// Enqueues an `error` envelope with the code's recoverability flag.
    pub fn send_error(
        &self,
        code: ErrorCode,
        message: &str,
        correlation_id: Option<&str>,
    ) -> Result<(), HubError> {
        let payload = ErrorPayload::new(code, message);
        match correlation_id {
            Some(id) if !id.is_empty() => self.send_message_with_correlation(
                MessageType::Error,
                id,
                &payload,
            ),
            _ => self.send_message(MessageType::Error, &payload),
        }
    }

    /// Builds, marshals, and enqueues one envelope under the connection
    /// lock. Holding the lock across allocation and enqueue is what makes
    /// the delivered seq order equal the numeric order.
    fn enqueue<T: serde::Serialize + ?Sized>(
        &self,
        kind: MessageType,
        correlation_id: Option<&str>,
        payload: &T,
    ) -> Result<(), HubError> {
        let mut inner = self.inner.write().unwrap();
        let sender = inner
            .sender
            .clone()
            .ok_or(HubError::ConnectionClosed)?;

        inner.outbound_seq += 1;
        let mut envelope =
            Envelope::with_seq(kind, inner.outbound_seq, payload)?;
        if let Some(id) = correlation_id {
            envelope.correlation_id = Some(id.to_string());
        }
        let data = envelope.encode()?;

        sender.try_send(data).map_err(|err| match err {
            TrySendError::Full(_) => HubError::SendBufferFull,
            TrySendError::Closed(_) => HubError::ConnectionClosed,
        })
    }

    /// Closes the outbound buffer. Idempotent. The writer task observes
    /// the closed channel, emits a close frame, and shuts the transport
    /// down.
    pub fn close(&self) {
        let mut inner = self.inner.write().unwrap();
        if inner.state == ConnectionState::Closing {
            return;
        }
        inner.state = ConnectionState::Closing;
        inner.sender = None;
    }
}

/// Generates a reconnect token: 32 random bytes, hex-encoded.
fn generate_reconnect_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
