//! WebSocket handler for real-time sync.
//!
//! Handles WebSocket connections and dispatches `WireMessage` frames to the
//! appropriate sync handlers while managing patch fan-out to other connected
//! stores.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use convergent_store::adapter::{validate_wire_message, MessageType, WireMessage};
use futures::{SinkExt, StreamExt};
use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::websocket::{
    fetch_patch_reply, parse_fetch_patch_request, parse_patch_broadcast, patch_broadcast,
    patch_broadcast_ack, storeid_reply, ConnectionManager,
};

use super::{handle_create_store_id, handle_fetch_patches, handle_patch_broadcast};

/// Handle an established WebSocket connection for `store_id`.
///
/// This function:
/// 1. Registers the connection with the manager
/// 2. Spawns a task to forward outgoing messages
/// 3. Processes incoming messages in a loop
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(
    socket: WebSocket,
    pool: Arc<PgPool>,
    conn_manager: Arc<ConnectionManager>,
    store_id: u32,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<WireMessage>();

    let conn_id = conn_manager.register(store_id, tx);

    tracing::info!(conn_id = %conn_id, store_id, "WebSocket client connected");

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => tracing::error!("Failed to serialize WebSocket message: {}", e),
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Some(response) =
                    process_message(&text, &pool, &conn_manager, &conn_id, store_id).await
                {
                    conn_manager.send_to_internal(&conn_id, response);
                }
            }
            Ok(Message::Binary(_)) => tracing::warn!("Binary messages not supported"),
            Ok(Message::Ping(data)) => tracing::trace!("Received ping: {} bytes", data.len()),
            Ok(Message::Pong(_)) => tracing::trace!("Received pong"),
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    conn_manager.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        store_id,
        active_connections = conn_manager.connection_count(),
        "WebSocket client disconnected"
    );
}

/// Process one inbound frame. Malformed or unroutable frames are logged and
/// dropped rather than propagated, per `validate_wire_message`'s contract.
async fn process_message(
    text: &str,
    pool: &PgPool,
    conn_manager: &ConnectionManager,
    conn_id: &str,
    store_id: u32,
) -> Option<WireMessage> {
    let raw: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Discarding unparseable WebSocket frame: {}", e);
            return None;
        }
    };

    let message = match validate_wire_message(&raw) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!("Discarding malformed WireMessage: {}", e);
            return None;
        }
    };

    match message.header.msg_type {
        MessageType::StoreidRequest => match handle_create_store_id(pool).await {
            Ok(new_store_id) => Some(storeid_reply(message.header.msg_id, new_store_id)),
            Err(e) => {
                tracing::error!("createStoreId failed: {}", e);
                None
            }
        },

        MessageType::PatchBroadcast => {
            let patch = match parse_patch_broadcast(&message) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("Discarding malformed patch-broadcast: {}", e);
                    return None;
                }
            };

            match handle_patch_broadcast(pool, store_id, patch).await {
                Ok(remote) => {
                    let fanout = patch_broadcast(&remote);
                    let sent = conn_manager.broadcast_except(conn_id, fanout);
                    tracing::debug!(sent_to = sent, "Fanned out broadcast patch");
                    Some(patch_broadcast_ack(message.header.msg_id, &remote))
                }
                Err(e) => {
                    tracing::error!("Failed to persist broadcast patch: {}", e);
                    None
                }
            }
        }

        MessageType::FetchPatchRequest => {
            let request = match parse_fetch_patch_request(&message) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Discarding malformed fetch-patch-request: {}", e);
                    return None;
                }
            };

            match handle_fetch_patches(pool, request.patch_ids).await {
                Ok(patches) => Some(fetch_patch_reply(message.header.msg_id, patches)),
                Err(e) => {
                    tracing::warn!("fetchPatches failed: {}", e);
                    None
                }
            }
        }

        MessageType::StoreidReply | MessageType::FetchPatchReply => {
            tracing::warn!(
                msg_type = ?message.header.msg_type,
                "Ignoring server-originated message type received from client"
            );
            None
        }
    }
}
