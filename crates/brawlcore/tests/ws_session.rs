//! End-to-end WebSocket tests: a real bound server, driven by
//! tokio-tungstenite clients.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

use brawlcore::prelude::*;

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// ========================================
// Harness
// ========================================

/// Starts a server on a random port; returns its address and shared state.
async fn start_server() -> (String, AppState) {
    let server = BrawlcoreServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let state = server.app_state();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the serve loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, state)
}

async fn connect(addr: &str, code: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!(
        "ws://{addr}/api/v1/ws/game/{code}"
    ))
    .await
    .expect("should connect");
    ws
}

fn envelope(kind: &str, payload: Value) -> Value {
    json!({
        "type": kind,
        "version": 1,
        "timestamp": 0,
        "seq": 1,
        "payload": payload,
    })
}

async fn send_raw(ws: &mut ClientWs, text: String) {
    ws.send(Message::Text(text)).await.expect("send should succeed");
}

async fn send(ws: &mut ClientWs, kind: &str, payload: Value) {
    send_raw(ws, envelope(kind, payload).to_string()).await;
}

/// Receives the next data frame as parsed JSON, skipping ping/pong.
async fn recv_envelope(ws: &mut ClientWs) -> Value {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended unexpectedly")
            .expect("websocket error");
        match frame {
            Message::Text(text) => {
                return serde_json::from_str(&text)
                    .expect("server sent invalid JSON");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Receives envelopes until one of the given type arrives.
async fn recv_type(ws: &mut ClientWs, kind: &str) -> Value {
    for _ in 0..32 {
        let env = recv_envelope(ws).await;
        if env["type"] == kind {
            return env;
        }
    }
    panic!("did not receive a {kind} message");
}

/// Authenticates and consumes the `authenticated` + initial
/// `lobby_updated` pair; returns the `authenticated` envelope.
async fn authenticate(ws: &mut ClientWs, player: &str, code: &str) -> Value {
    send(
        ws,
        "authenticate",
        json!({
            "player_id": player,
            "session_token": "session-token",
            "lobby_code": code,
        }),
    )
    .await;
    let auth = recv_type(ws, "authenticated").await;
    recv_type(ws, "lobby_updated").await;
    auth
}

async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    false
}

// ========================================
// Upgrade and authentication
// ========================================

#[tokio::test]
async fn test_upgrade_unknown_lobby_is_rejected() {
    let (addr, _state) = start_server().await;

    let result = tokio_tungstenite::connect_async(format!(
        "ws://{addr}/api/v1/ws/game/NOPE22"
    ))
    .await;

    assert!(result.is_err(), "upgrade should fail for a missing lobby");
}

#[tokio::test]
async fn test_auth_success_sends_token_then_lobby_state() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;

    send(
        &mut ws,
        "authenticate",
        json!({
            "player_id": "p1",
            "session_token": "session-token",
            "lobby_code": lobby.code(),
        }),
    )
    .await;

    let auth = recv_envelope(&mut ws).await;
    assert_eq!(auth["type"], "authenticated");
    assert_eq!(auth["seq"], 1);
    assert_eq!(auth["payload"]["player_id"], "p1");
    assert_eq!(
        auth["payload"]["reconnect_token"].as_str().unwrap().len(),
        64
    );
    assert!(auth["payload"]["session_expires_at"].as_i64().unwrap() > 0);

    let update = recv_envelope(&mut ws).await;
    assert_eq!(update["type"], "lobby_updated");
    assert_eq!(update["seq"], 2);
    assert_eq!(update["payload"]["event"], "state_changed");
    assert_eq!(update["payload"]["lobby"]["code"], lobby.code());
    assert_eq!(update["payload"]["lobby"]["players"][0]["is_host"], true);

    assert!(wait_for(|| state.hub.is_player_connected("p1")).await);
}

#[tokio::test]
async fn test_auth_missing_fields_fails() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;

    send(
        &mut ws,
        "authenticate",
        json!({"player_id": "", "lobby_code": lobby.code()}),
    )
    .await;

    let err = recv_type(&mut ws, "error").await;
    assert_eq!(err["payload"]["code"], "AUTH_FAILED");
    assert_eq!(err["payload"]["recoverable"], false);
}

#[tokio::test]
async fn test_auth_unknown_lobby_code_fails() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;

    send(
        &mut ws,
        "authenticate",
        json!({"player_id": "p1", "lobby_code": "NOPE22"}),
    )
    .await;

    let err = recv_type(&mut ws, "error").await;
    assert_eq!(err["payload"]["code"], "LOBBY_NOT_FOUND");
}

#[tokio::test]
async fn test_auth_player_not_in_lobby_fails() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;

    send(
        &mut ws,
        "authenticate",
        json!({"player_id": "stranger", "lobby_code": lobby.code()}),
    )
    .await;

    let err = recv_type(&mut ws, "error").await;
    assert_eq!(err["payload"]["code"], "PLAYER_NOT_IN_LOBBY");
}

#[tokio::test]
async fn test_version_mismatch_rejected_with_correlation() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;

    send_raw(
        &mut ws,
        json!({
            "type": "authenticate",
            "version": 999,
            "timestamp": 0,
            "correlation_id": "corr-1",
            "payload": {"player_id": "p1", "lobby_code": lobby.code()},
        })
        .to_string(),
    )
    .await;

    let err = recv_type(&mut ws, "error").await;
    assert_eq!(err["payload"]["code"], "VERSION_MISMATCH");
    assert_eq!(err["payload"]["recoverable"], false);
    assert_eq!(err["correlation_id"], "corr-1");
}

#[tokio::test]
async fn test_messages_before_auth_require_authentication() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;

    send(&mut ws, "set_ready", json!({"ready": true})).await;

    let err = recv_type(&mut ws, "error").await;
    assert_eq!(err["payload"]["code"], "AUTH_REQUIRED");
    assert_eq!(err["payload"]["recoverable"], false);
}

// ========================================
// Ordering and framing
// ========================================

#[tokio::test]
async fn test_seq_is_strictly_increasing_and_gap_free() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;

    // authenticated = 1, lobby_updated = 2.
    authenticate(&mut ws, "p1", lobby.code()).await;

    for expected in 3..=6 {
        send(&mut ws, "heartbeat", json!({})).await;
        let ack = recv_type(&mut ws, "heartbeat_ack").await;
        assert_eq!(ack["seq"], expected);
    }
}

#[tokio::test]
async fn test_heartbeat_ack_echoes_correlation() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;
    authenticate(&mut ws, "p1", lobby.code()).await;

    send_raw(
        &mut ws,
        json!({
            "type": "heartbeat",
            "version": 1,
            "timestamp": 0,
            "correlation_id": "hb-7",
            "payload": {},
        })
        .to_string(),
    )
    .await;

    let ack = recv_type(&mut ws, "heartbeat_ack").await;
    assert_eq!(ack["correlation_id"], "hb-7");
    assert!(ack["payload"]["server_time"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_malformed_json_gets_error_and_connection_survives() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;
    authenticate(&mut ws, "p1", lobby.code()).await;

    send_raw(&mut ws, "this is not json".to_string()).await;
    let err = recv_type(&mut ws, "error").await;
    assert_eq!(err["payload"]["code"], "MALFORMED_MESSAGE");
    assert_eq!(err["payload"]["recoverable"], true);

    // The connection still works afterwards.
    send(&mut ws, "heartbeat", json!({})).await;
    recv_type(&mut ws, "heartbeat_ack").await;
}

#[tokio::test]
async fn test_unknown_message_type_is_malformed() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;
    authenticate(&mut ws, "p1", lobby.code()).await;

    send(&mut ws, "fly_to_moon", json!({"speed": 9000})).await;

    let err = recv_type(&mut ws, "error").await;
    assert_eq!(err["payload"]["code"], "MALFORMED_MESSAGE");
}

#[tokio::test]
async fn test_battle_messages_answer_invalid_state() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let mut ws = connect(&addr, lobby.code()).await;
    authenticate(&mut ws, "p1", lobby.code()).await;

    send(
        &mut ws,
        "submit_action",
        json!({"turn_number": 1, "action_type": "attack", "action_data": {}}),
    )
    .await;

    let err = recv_type(&mut ws, "error").await;
    assert_eq!(err["payload"]["code"], "INVALID_STATE");
    assert_eq!(err["payload"]["recoverable"], true);
    assert_eq!(err["payload"]["message"], "No active battle");
}

// ========================================
// Ready-up coordination
// ========================================

#[tokio::test]
async fn test_both_ready_starts_game() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let code = lobby.code().to_string();
    state.registry.join(&code, "p2", "Player2").unwrap();

    let mut ws1 = connect(&addr, &code).await;
    let mut ws2 = connect(&addr, &code).await;
    authenticate(&mut ws1, "p1", &code).await;
    authenticate(&mut ws2, "p2", &code).await;

    // Player 1 readies up; both clients see the broadcast.
    send(&mut ws1, "set_ready", json!({"ready": true})).await;
    let update1 = recv_type(&mut ws1, "lobby_updated").await;
    let update2 = recv_type(&mut ws2, "lobby_updated").await;
    for update in [&update1, &update2] {
        assert_eq!(update["payload"]["event"], "player_ready_changed");
        assert_eq!(update["payload"]["event_data"]["player_id"], "p1");
        assert_eq!(update["payload"]["event_data"]["ready"], true);
    }
    let players = update1["payload"]["lobby"]["players"].as_array().unwrap();
    let p1 = players.iter().find(|p| p["id"] == "p1").unwrap();
    assert_eq!(p1["is_ready"], true);

    // Player 2 readies up: one more broadcast, then the start sequence.
    send(&mut ws2, "set_ready", json!({"ready": true})).await;
    for ws in [&mut ws1, &mut ws2] {
        let update = recv_type(ws, "lobby_updated").await;
        assert_eq!(update["payload"]["event_data"]["player_id"], "p2");

        let starting = recv_envelope(ws).await;
        assert_eq!(starting["type"], "game_starting");
        assert_eq!(starting["payload"]["countdown_sec"], 0);
        assert!(starting["payload"]["starts_at"].as_i64().unwrap() > 0);

        let started = recv_envelope(ws).await;
        assert_eq!(started["type"], "game_started");
        assert_eq!(started["payload"]["game_id"], code);
    }

    // The lobby's ready state is cleared once the game starts.
    assert!(!state.handler.is_player_ready(&code, "p1"));
    assert!(!state.handler.is_player_ready(&code, "p2"));
}

#[tokio::test]
async fn test_ready_toggle_restores_unready() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let code = lobby.code().to_string();
    let mut ws = connect(&addr, &code).await;
    authenticate(&mut ws, "p1", &code).await;

    send(&mut ws, "set_ready", json!({"ready": true})).await;
    let on = recv_type(&mut ws, "lobby_updated").await;
    assert_eq!(on["payload"]["event_data"]["ready"], true);
    assert_eq!(on["payload"]["lobby"]["players"][0]["is_ready"], true);
    assert!(state.handler.is_player_ready(&code, "p1"));

    send(&mut ws, "set_ready", json!({"ready": false})).await;
    let off = recv_type(&mut ws, "lobby_updated").await;
    assert_eq!(off["payload"]["event_data"]["ready"], false);
    assert_eq!(off["payload"]["lobby"]["players"][0]["is_ready"], false);
    assert!(!state.handler.is_player_ready(&code, "p1"));
}

#[tokio::test]
async fn test_single_ready_does_not_start_game() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let code = lobby.code().to_string();
    state.registry.join(&code, "p2", "Player2").unwrap();

    let mut ws1 = connect(&addr, &code).await;
    let mut ws2 = connect(&addr, &code).await;
    authenticate(&mut ws1, "p1", &code).await;
    authenticate(&mut ws2, "p2", &code).await;

    send(&mut ws1, "set_ready", json!({"ready": true})).await;
    recv_type(&mut ws1, "lobby_updated").await;

    // A heartbeat round-trips after the broadcast; if the start sequence
    // had fired, game_starting would arrive before the ack.
    send(&mut ws1, "heartbeat", json!({})).await;
    let next = recv_envelope(&mut ws1).await;
    assert_eq!(next["type"], "heartbeat_ack");
}

// ========================================
// Disconnection and displacement
// ========================================

#[tokio::test]
async fn test_disconnect_clears_ready_state() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let code = lobby.code().to_string();
    let mut ws = connect(&addr, &code).await;
    authenticate(&mut ws, "p1", &code).await;

    send(&mut ws, "set_ready", json!({"ready": true})).await;
    recv_type(&mut ws, "lobby_updated").await;
    assert!(state.handler.is_player_ready(&code, "p1"));

    drop(ws);

    assert!(wait_for(|| !state.hub.is_player_connected("p1")).await);
    assert!(
        wait_for(|| !state.handler.is_player_ready(&code, "p1")).await,
        "ready state should be cleared after the disconnect is processed"
    );
}

#[tokio::test]
async fn test_second_auth_displaces_first_connection() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let code = lobby.code().to_string();

    let mut first = connect(&addr, &code).await;
    authenticate(&mut first, "p1", &code).await;

    // No reconnect token: the new session still displaces the old one.
    let mut second = connect(&addr, &code).await;
    authenticate(&mut second, "p1", &code).await;

    // The displaced connection is closed by the server.
    let closed = tokio::time::timeout(RECV_TIMEOUT, async {
        loop {
            match first.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(_)) => break,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "first connection should be closed");

    // The survivor is the live session for the player.
    assert!(state.hub.is_player_connected("p1"));
    send(&mut second, "heartbeat", json!({})).await;
    recv_type(&mut second, "heartbeat_ack").await;
}

#[tokio::test]
async fn test_reconnect_token_replaces_prior_session() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let code = lobby.code().to_string();

    let mut first = connect(&addr, &code).await;
    let auth = authenticate(&mut first, "p1", &code).await;
    let token = auth["payload"]["reconnect_token"].as_str().unwrap();

    let mut second = connect(&addr, &code).await;
    send(
        &mut second,
        "authenticate",
        json!({
            "player_id": "p1",
            "session_token": "session-token",
            "lobby_code": code,
            "reconnect_token": token,
        }),
    )
    .await;

    let reauth = recv_type(&mut second, "authenticated").await;
    let new_token =
        reauth["payload"]["reconnect_token"].as_str().unwrap();
    assert_ne!(new_token, token, "a fresh token is issued on reconnect");
    assert_eq!(new_token.len(), 64);

    assert!(wait_for(|| state.hub.is_player_connected("p1")).await);
}

#[tokio::test]
async fn test_leave_game_notifies_peer_and_disconnects() {
    let (addr, state) = start_server().await;
    let lobby = state.registry.create("p1", "Player1");
    let code = lobby.code().to_string();
    state.registry.join(&code, "p2", "Player2").unwrap();

    let mut ws1 = connect(&addr, &code).await;
    let mut ws2 = connect(&addr, &code).await;
    authenticate(&mut ws1, "p1", &code).await;
    authenticate(&mut ws2, "p2", &code).await;

    send(&mut ws2, "leave_game", json!({})).await;

    let update = recv_type(&mut ws1, "lobby_updated").await;
    assert_eq!(update["payload"]["event"], "player_left");
    assert_eq!(update["payload"]["event_data"]["player_id"], "p2");
    let players = update["payload"]["lobby"]["players"].as_array().unwrap();
    assert!(players.iter().all(|p| p["id"] != "p2"));

    assert!(wait_for(|| !state.hub.is_player_connected("p2")).await);
    let remaining = state.registry.get(&code).unwrap();
    assert_eq!(remaining.player_count(), 1);
    assert!(remaining.has_player("p1"));
}
