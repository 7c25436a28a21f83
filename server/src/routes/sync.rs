//! Sync endpoint routes: store id allocation, patch history bootstrap, and
//! the real-time WebSocket connection.

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_bootstrap, handle_create_store_id, handle_websocket_connection};
use crate::AppState;
use convergent_store::adapter::PatchHistory;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stores", post(create_store_handler))
        .route("/stores/:store_id/history", get(history_handler))
        .route("/stores/:store_id/ws", get(websocket_handler))
}

#[derive(Serialize)]
struct CreateStoreResponse {
    store_id: u32,
}

/// POST /stores - allocate a fresh store id (`createStoreId`).
async fn create_store_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<CreateStoreResponse>> {
    let store_id = handle_create_store_id(&state.pool).await?;
    Ok(Json(CreateStoreResponse { store_id }))
}

/// GET /stores/:store_id/history - bootstrap a store with the full patch
/// history, delivered once before `registerPatchHandler` switches to live
/// WebSocket patches. `store_id` only identifies the requester for logging;
/// the patch log itself is shared across every store.
async fn history_handler(
    State(state): State<AppState>,
    Path(store_id): Path<u32>,
    _auth: AuthUser,
) -> Result<Json<PatchHistory>> {
    tracing::debug!(store_id, "Serving patch history bootstrap");
    let history = handle_bootstrap(&state.pool).await?;
    Ok(Json(history))
}

/// GET /stores/:store_id/ws - WebSocket endpoint for live patch exchange.
///
/// Clients should connect with `Authorization: Bearer <token>` if auth is
/// configured.
async fn websocket_handler(
    State(state): State<AppState>,
    Path(store_id): Path<u32>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    if let Some(ref _secret) = state.config.auth_secret {
        let auth_header = headers.get("authorization").and_then(|v| v.to_str().ok());

        match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                let token = header.trim_start_matches("Bearer ");
                if token.is_empty() {
                    return ws.on_upgrade(|socket| async {
                        let _ = socket;
                        tracing::warn!("WebSocket connection rejected: empty bearer token");
                    });
                }
            }
            Some(_) => {
                return ws.on_upgrade(|socket| async {
                    let _ = socket;
                    tracing::warn!("WebSocket connection rejected: invalid auth header format");
                });
            }
            None => {
                return ws.on_upgrade(|socket| async {
                    let _ = socket;
                    tracing::warn!("WebSocket connection rejected: missing auth header");
                });
            }
        }
    }

    let pool = Arc::new(state.pool.clone());
    let conn_manager = state.conn_manager.clone();

    tracing::info!(store_id, "WebSocket upgrade requested");

    ws.on_upgrade(move |socket: WebSocket| {
        handle_websocket_connection(socket, pool, conn_manager, store_id)
    })
}
