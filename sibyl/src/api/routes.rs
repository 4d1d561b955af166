//! HTTP and WebSocket routes
//!
//! The WebSocket speaks a small JSON envelope: incoming frames are
//! `{"type": "message"|"clear_history", "content": ...}` (raw non-JSON
//! frames are treated as plain messages), outgoing frames are typed
//! `message` / `system` / `error` / `typing` objects.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::chat::SessionRegistry;
use crate::llm::Turn;

use super::middleware::AuthState;

/// Application state shared by the chat routes
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in_hours: i64,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<Turn>,
}

/// Incoming WebSocket envelope
#[derive(Deserialize)]
struct Inbound {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Issue a session token. Credential validation is delegated to the
/// identity collaborator; here any non-empty pair is accepted.
pub async fn login(
    State(auth_state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if payload.username.is_empty() || payload.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let expires_in_hours = 24;
    let token = auth_state
        .jwt
        .issue(&payload.username, chrono::Duration::hours(expires_in_hours))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse {
        token,
        expires_in_hours,
    }))
}

/// Full conversation history for a client, for display.
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let messages = state
        .registry
        .history(&client_id)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;

    Ok(Json(HistoryResponse { messages }))
}

/// WebSocket chat endpoint
pub async fn chat_socket(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, client_id: String) {
    state.registry.create_session(&client_id).await;
    info!("websocket connected: {}", client_id);

    while let Some(frame) = socket.recv().await {
        let raw = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        match serde_json::from_str::<Inbound>(&raw) {
            Ok(inbound) if inbound.kind == "message" => {
                if deliver_reply(&mut socket, &state, &client_id, &inbound.content)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(inbound) if inbound.kind == "clear_history" => {
                let reply = match state.registry.clear_history(&client_id).await {
                    Ok(()) => json!({"type": "system", "message": "Chat history cleared"}),
                    Err(err) => json!({"type": "error", "message": err.to_string()}),
                };
                if send_json(&mut socket, reply).await.is_err() {
                    break;
                }
            }
            Ok(inbound) => {
                warn!("unknown frame type '{}' from {}", inbound.kind, client_id);
            }
            // Not JSON at all: treat the whole frame as a message
            Err(_) => {
                if deliver_reply(&mut socket, &state, &client_id, &raw)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    // Disconnect only stops delivery; the reaper owns session teardown so
    // a reconnecting client finds its history intact.
    info!("websocket disconnected: {}", client_id);
}

async fn deliver_reply(
    socket: &mut WebSocket,
    state: &Arc<AppState>,
    client_id: &str,
    content: &str,
) -> Result<(), axum::Error> {
    send_json(socket, json!({"type": "typing", "status": true})).await?;

    let started = Instant::now();
    let result = state.registry.handle_message(client_id, content).await;
    let response_time = started.elapsed().as_secs_f64();

    send_json(socket, json!({"type": "typing", "status": false})).await?;

    let envelope = match result {
        Ok(reply) => json!({
            "type": "message",
            "role": "assistant",
            "content": reply,
            "id": uuid::Uuid::new_v4().to_string(),
            "metadata": {"response_time": (response_time * 100.0).round() / 100.0},
        }),
        Err(err) => {
            warn!("failed to handle message from {}: {}", client_id, err);
            json!({
                "type": "error",
                "message": "Sorry, I encountered an error while processing your message. Please try again.",
            })
        }
    };

    send_json(socket, envelope).await
}

async fn send_json(socket: &mut WebSocket, value: serde_json::Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string())).await
}
