//! The HTTP adapter: REST lobby CRUD under `/api/v1` plus the WebSocket
//! upgrade route.
//!
//! This layer is a thin translation between request bodies and registry
//! operations. Domain sentinels map to status codes here; the messages in
//! the error bodies are part of the external contract.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use brawlcore_hub::Hub;
use brawlcore_lobby::{Lobby, LobbyError, LobbyRegistry, RegistryError};

use crate::SessionHandler;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<LobbyRegistry>,
    pub hub: Arc<Hub>,
    pub handler: Arc<SessionHandler>,
}

// ---------------------------------------------------------------------------
// Request / response DTOs
// ---------------------------------------------------------------------------

/// Fields default to empty so that absent and empty values both produce
/// the documented 400 instead of an extractor rejection.
#[derive(Debug, Deserialize)]
pub struct CreateLobbyRequest {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinLobbyRequest {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaveLobbyRequest {
    #[serde(default)]
    pub player_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StartGameRequest {
    #[serde(default)]
    pub player_id: String,
}

#[derive(Debug, Serialize)]
pub struct PlayerResponse {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct LobbyResponse {
    pub code: String,
    pub state: String,
    pub players: Vec<PlayerResponse>,
    pub host_id: String,
    pub max_players: usize,
}

fn lobby_response(lobby: &Lobby) -> LobbyResponse {
    LobbyResponse {
        code: lobby.code().to_string(),
        state: lobby.state().to_string(),
        players: lobby
            .players()
            .into_iter()
            .map(|player| PlayerResponse {
                id: player.id,
                username: player.username,
            })
            .collect(),
        host_id: lobby.host_id(),
        max_players: lobby.max_players(),
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/lobbies
async fn create_lobby(
    State(state): State<AppState>,
    Json(request): Json<CreateLobbyRequest>,
) -> Response {
    if request.player_id.is_empty() || request.username.is_empty() {
        return error_body(
            StatusCode::BAD_REQUEST,
            "player_id and username are required",
        );
    }

    let lobby = state.registry.create(&request.player_id, &request.username);
    (StatusCode::CREATED, Json(lobby_response(&lobby))).into_response()
}

/// GET /api/v1/lobbies
async fn list_lobbies(State(state): State<AppState>) -> Response {
    let lobbies: Vec<LobbyResponse> = state
        .registry
        .list()
        .iter()
        .map(|lobby| lobby_response(lobby))
        .collect();
    (StatusCode::OK, Json(lobbies)).into_response()
}

/// GET /api/v1/lobbies/:code
async fn get_lobby(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Response {
    match state.registry.get(&code) {
        Ok(lobby) => {
            (StatusCode::OK, Json(lobby_response(&lobby))).into_response()
        }
        Err(_) => error_body(StatusCode::NOT_FOUND, "lobby not found"),
    }
}

/// POST /api/v1/lobbies/:code/join
async fn join_lobby(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<JoinLobbyRequest>,
) -> Response {
    if request.player_id.is_empty() || request.username.is_empty() {
        return error_body(
            StatusCode::BAD_REQUEST,
            "player_id and username are required",
        );
    }

    match state
        .registry
        .join(&code, &request.player_id, &request.username)
    {
        Ok(lobby) => {
            (StatusCode::OK, Json(lobby_response(&lobby))).into_response()
        }
        Err(RegistryError::NotFound(_)) => {
            error_body(StatusCode::NOT_FOUND, "lobby not found")
        }
        Err(err) => match err.domain() {
            Some(LobbyError::LobbyFull) => {
                error_body(StatusCode::CONFLICT, "lobby is full")
            }
            Some(LobbyError::AlreadyJoined) => {
                error_body(StatusCode::CONFLICT, "player already in lobby")
            }
            Some(LobbyError::InvalidStateForJoin) => error_body(
                StatusCode::CONFLICT,
                "cannot join lobby in current state",
            ),
            _ => error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to join lobby",
            ),
        },
    }
}

/// POST /api/v1/lobbies/:code/leave
async fn leave_lobby(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<LeaveLobbyRequest>,
) -> Response {
    if request.player_id.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "player_id is required");
    }

    match state.registry.leave(&code, &request.player_id) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"message": "left lobby successfully"})),
        )
            .into_response(),
        Err(RegistryError::NotFound(_)) => {
            error_body(StatusCode::NOT_FOUND, "lobby not found")
        }
        Err(err) => match err.domain() {
            Some(LobbyError::PlayerNotFound) => error_body(
                StatusCode::NOT_FOUND,
                "player not found in lobby",
            ),
            _ => error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to leave lobby",
            ),
        },
    }
}

/// POST /api/v1/lobbies/:code/start
async fn start_game(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<StartGameRequest>,
) -> Response {
    if request.player_id.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "player_id is required");
    }

    match state.registry.start_game(&code, &request.player_id) {
        Ok(()) => match state.registry.get(&code) {
            Ok(lobby) => {
                (StatusCode::OK, Json(lobby_response(&lobby))).into_response()
            }
            Err(_) => error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "game started but failed to get lobby state",
            ),
        },
        Err(RegistryError::NotFound(_)) => {
            error_body(StatusCode::NOT_FOUND, "lobby not found")
        }
        Err(RegistryError::NotHost { .. }) => error_body(
            StatusCode::FORBIDDEN,
            "only host can start the game",
        ),
        Err(err) => match err.domain() {
            Some(LobbyError::InvalidStateForStart) => error_body(
                StatusCode::CONFLICT,
                "cannot start game in current state",
            ),
            Some(LobbyError::NotEnoughPlayers) => error_body(
                StatusCode::CONFLICT,
                "not enough players to start",
            ),
            _ => error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to start game",
            ),
        },
    }
}

/// GET /api/v1/health
async fn health() -> Response {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
        .into_response()
}

/// Builds the full API router: REST lobby CRUD plus the WebSocket
/// upgrade endpoint.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/lobbies", post(create_lobby).get(list_lobbies))
        .route("/api/v1/lobbies/:code", get(get_lobby))
        .route("/api/v1/lobbies/:code/join", post(join_lobby))
        .route("/api/v1/lobbies/:code/leave", post(leave_lobby))
        .route("/api/v1/lobbies/:code/start", post(start_game))
        .route("/api/v1/ws/game/:code", get(crate::ws::ws_upgrade))
        .route("/api/v1/health", get(health))
        .with_state(state)
}
