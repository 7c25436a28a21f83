//! WebSocket connection manager.
//!
//! Tracks active WebSocket connections and provides broadcast capabilities
//! for pushing patches to connected stores.

use std::sync::Arc;

use convergent_store::adapter::WireMessage;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<WireMessage>;

/// A single WebSocket connection, one per connected store.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: String,
    /// The store id this connection speaks for
    pub store_id: u32,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// All active connections, keyed by connection ID.
    pub(crate) connections: DashMap<String, Connection>,
    /// Index of connections by store id for efficient lookup.
    by_store_id: DashMap<u32, Vec<String>>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self { connections: DashMap::new(), by_store_id: DashMap::new() }
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection.
    ///
    /// Returns the connection ID.
    pub fn register(&self, store_id: u32, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        let connection = Connection { id: conn_id.clone(), store_id, sender };

        self.connections.insert(conn_id.clone(), connection);
        self.by_store_id.entry(store_id).or_default().push(conn_id.clone());

        tracing::info!(conn_id = %conn_id, store_id, "WebSocket connection registered");

        conn_id
    }

    /// Unregister a connection.
    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, conn)) = self.connections.remove(conn_id) {
            if let Some(mut conn_ids) = self.by_store_id.get_mut(&conn.store_id) {
                conn_ids.retain(|id| id != conn_id);
                if conn_ids.is_empty() {
                    drop(conn_ids);
                    self.by_store_id.remove(&conn.store_id);
                }
            }

            tracing::info!(conn_id = %conn_id, store_id = conn.store_id, "WebSocket connection unregistered");
        }
    }

    /// Broadcast a message to all connections except the sender.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast_except(&self, sender_conn_id: &str, message: WireMessage) -> usize {
        let mut sent_count = 0;

        for entry in self.connections.iter() {
            let conn = entry.value();
            if conn.id != sender_conn_id && conn.sender.send(message.clone()).is_ok() {
                sent_count += 1;
            }
        }

        tracing::debug!(
            sender = %sender_conn_id,
            recipients = sent_count,
            "Broadcast message to connections"
        );

        sent_count
    }

    /// Broadcast a message to all connections.
    ///
    /// Returns the number of connections that received the message.
    #[allow(dead_code)]
    pub fn broadcast_all(&self, message: WireMessage) -> usize {
        let mut sent_count = 0;

        for entry in self.connections.iter() {
            if entry.value().sender.send(message.clone()).is_ok() {
                sent_count += 1;
            }
        }

        sent_count
    }

    /// Send a message to a specific connection.
    #[allow(dead_code)]
    pub fn send_to(&self, conn_id: &str, message: WireMessage) -> bool {
        if let Some(conn) = self.connections.get(conn_id) {
            conn.sender.send(message).is_ok()
        } else {
            false
        }
    }

    /// Internal method to send a message to a connection (used by handler).
    pub(crate) fn send_to_internal(&self, conn_id: &str, message: WireMessage) {
        if let Some(conn) = self.connections.get(conn_id) {
            let _ = conn.sender.send(message);
        }
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of unique store ids connected.
    #[allow(dead_code)]
    pub fn store_count(&self) -> usize {
        self.by_store_id.len()
    }
}
