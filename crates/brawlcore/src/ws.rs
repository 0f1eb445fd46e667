//! WebSocket upgrade endpoint and the per-connection read/write pumps.
//!
//! Each accepted socket is driven by exactly two cooperating tasks:
//!
//! - the **read pump** parses inbound frames, feeds envelopes to the
//!   session handler, and unregisters the connection when it terminates;
//! - the **write pump** drains the connection's outbound buffer onto the
//!   socket and keeps the peer alive with periodic pings.
//!
//! Transport ping/pong is the primary liveness signal: the write pump
//! pings every 54 seconds and the read pump gives up when nothing — pong
//! included — arrives within 60 seconds.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};

use brawlcore_hub::Connection;
use brawlcore_protocol::{Envelope, ErrorCode};

use crate::http::AppState;
use crate::SessionHandler;

/// Time allowed to write one frame to the peer.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed between inbound frames before the peer is considered gone.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Ping period. Must be below [`READ_TIMEOUT`] so a healthy peer's pongs
/// keep extending the read deadline.
const PING_INTERVAL: Duration = Duration::from_secs(54);

/// Maximum inbound message size.
const MAX_MESSAGE_SIZE: usize = 8192;

/// `GET /api/v1/ws/game/:code` — upgrades the connection after checking
/// the lobby exists.
pub(crate) async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if state.registry.get(&code).is_err() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "lobby not found"})),
        )
            .into_response();
    }

    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| client_session(socket, state))
}

/// Owns one client socket from upgrade to teardown.
async fn client_session(socket: WebSocket, state: AppState) {
    let (conn, outbound) = Connection::new();
    state.hub.register(Arc::clone(&conn)).await;

    tracing::debug!(id = %conn.id(), "websocket session started");

    let (sink, stream) = socket.split();
    let writer = tokio::spawn(write_pump(sink, outbound));

    read_pump(stream, Arc::clone(&conn), Arc::clone(&state.handler)).await;

    // Unregister closes the outbound buffer, which lets the write pump
    // emit its close frame and exit.
    state.hub.unregister(Arc::clone(&conn)).await;
    let _ = writer.await;

    tracing::debug!(id = %conn.id(), "websocket session ended");
}

/// Parses frames and dispatches envelopes until the peer goes away.
async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    conn: Arc<Connection>,
    handler: Arc<SessionHandler>,
) {
    loop {
        let frame = match timeout(READ_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(err))) => {
                tracing::debug!(id = %conn.id(), error = %err, "read error");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(id = %conn.id(), "read deadline exceeded");
                break;
            }
        };

        let data = match frame {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(data) => data,
            // Any frame, pong included, restarted the deadline above.
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
        };

        let envelope = match Envelope::decode(&data) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(
                    id = %conn.id(),
                    error = %err,
                    "malformed envelope"
                );
                let _ = conn.send_error(
                    ErrorCode::MalformedMessage,
                    "Could not parse message envelope",
                    None,
                );
                continue;
            }
        };

        if envelope.seq > 0 {
            conn.update_last_received_seq(envelope.seq);
        }

        handler.handle_message(&conn, envelope).await;
    }
}

/// Drains the outbound buffer onto the socket, pinging periodically.
/// A closed buffer (the hub unregistered the connection) sends a close
/// frame and exits.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Vec<u8>>,
) {
    let mut ping = interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval fires immediately; skip it.
    ping.tick().await;

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(data) => {
                    let Ok(text) = String::from_utf8(data) else {
                        // Buffered frames are serde_json output; anything
                        // else never reaches the channel.
                        continue;
                    };
                    match timeout(WRITE_TIMEOUT, sink.send(Message::Text(text)))
                        .await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) | Err(_) => break,
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                match timeout(WRITE_TIMEOUT, sink.send(Message::Ping(Vec::new())))
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) | Err(_) => break,
                }
            }
        }
    }
}
