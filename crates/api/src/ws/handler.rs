//! WebSocket upgrade and per-connection lifecycle.
//!
//! Authentication happens at connect time, before the connection is
//! registered. The token comes from the `token` query parameter (browsers
//! cannot set headers on WebSocket requests) or the `Authorization` header.
//! A missing or invalid token closes the socket with code 4401 and the
//! connection never enters the registry.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use resona_core::types::DbId;

use crate::auth::jwt::{validate_token, JwtConfig};
use crate::state::AppState;
use crate::ws::ConnectionRegistry;

/// Application close code for failed connect-time authentication.
const CLOSE_UNAUTHORIZED: u16 = 4401;

/// Query parameters accepted on the `/ws` upgrade request.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// JWT access token (alternative to the `Authorization` header).
    pub token: Option<String>,
}

/// GET /ws -- upgrade to WebSocket and manage the connection.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let token = query.token.or_else(|| bearer_token(&headers));
    ws.on_upgrade(move |socket| {
        handle_socket(socket, Arc::clone(&state.registry), state.config.jwt.clone(), token)
    })
}

/// Extract a Bearer token from the `Authorization` header, if present.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Manage a single WebSocket connection after upgrade.
///
/// Validates the token first; on failure the socket is closed with 4401
/// without ever being registered. On success:
///   1. Registers the connection under its owner.
///   2. Spawns a sender task that forwards messages from the registry channel.
///   3. Drains inbound messages on the current task (clients only listen).
///   4. Cleans up on disconnect, pruning the owner entry if it was the last.
async fn handle_socket(
    mut socket: WebSocket,
    registry: Arc<ConnectionRegistry>,
    jwt: JwtConfig,
    token: Option<String>,
) {
    let owner_id = match authenticate(&jwt, token.as_deref()) {
        Ok(owner_id) => owner_id,
        Err(reason) => {
            tracing::debug!(reason, "WebSocket authentication failed");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CLOSE_UNAUTHORIZED,
                    reason: "authentication failed".into(),
                })))
                .await;
            return;
        }
    };

    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, owner_id = %owner_id, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = registry.register(owner_id, conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: clients do not push messages, so everything inbound
    // except Close is ignored.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_msg) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: remove connection and abort sender task.
    registry.unregister(owner_id, &conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, owner_id = %owner_id, "WebSocket disconnected");
}

/// Validate the connect-time token and return the authenticated owner.
fn authenticate(jwt: &JwtConfig, token: Option<&str>) -> Result<DbId, &'static str> {
    let token = token.ok_or("missing token")?;
    let claims = validate_token(token, jwt).map_err(|_| "invalid or expired token")?;
    Ok(claims.sub)
}
