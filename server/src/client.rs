//! Reference `ServerAdapter` client: talks to this crate's own HTTP+WebSocket
//! routes over the wire, so a `Store` running in a separate process (or the
//! same one, for local integration tests) gets a real, non-loopback adapter.
//!
//! `createStoreId` goes over plain HTTP (`POST /stores`) with bounded
//! exponential backoff and a caller-supplied timeout, per spec.md §4.7/§5.
//! Everything else — patch broadcast, patch fetch, and the unsolicited
//! `RemotePatch` stream — goes over the `/stores/:store_id/ws` connection
//! `register_patch_handler` opens, correlating replies to requests by the
//! wire message's `msgId`/`parentId`, mirroring the teacher's own
//! request/reply pairing over its connection manager.

use convergent_store::adapter::{
    AdapterEvent, Disposable, MessageHeader, MessageType, PatchHistory, ServerAdapter, Timeout, WireMessage,
};
use convergent_store::{Error, Patch, RemotePatch, Result};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::client::IntoClientRequest, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::websocket::{FetchPatchReplyContent, FetchPatchRequestContent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsMessage = tokio_tungstenite::tungstenite::Message;

const MAX_STOREID_ATTEMPTS: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Live websocket connection plus the in-flight requests waiting on a reply.
struct Connection {
    write: Mutex<SplitSink<WsStream, WsMessage>>,
    pending: Mutex<HashMap<Uuid, oneshot::Sender<WireMessage>>>,
}

pub struct HttpServerAdapter {
    http: reqwest::Client,
    http_base: String,
    ws_base: String,
    auth_token: Option<String>,
    conn: Mutex<Option<Arc<Connection>>>,
}

impl HttpServerAdapter {
    /// `http_base` e.g. `http://localhost:8080`, `ws_base` e.g. `ws://localhost:8080`.
    pub fn new(http_base: String, ws_base: String, auth_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            http_base,
            ws_base,
            auth_token,
            conn: Mutex::new(None),
        }
    }

    async fn send_and_await(&self, message: WireMessage, timeout: Timeout) -> Result<WireMessage> {
        let conn = self
            .conn
            .lock()
            .await
            .clone()
            .ok_or_else(|| Error::AdapterUnavailable("not connected: call register_patch_handler first".into()))?;

        let (tx, rx) = oneshot::channel();
        conn.pending.lock().await.insert(message.header.msg_id, tx);

        let text = serde_json::to_string(&message).expect("WireMessage always serializes");
        if let Err(error) = conn.write.lock().await.send(WsMessage::Text(text.into())).await {
            conn.pending.lock().await.remove(&message.header.msg_id);
            return Err(Error::AdapterUnavailable(error.to_string()));
        }

        match tokio::time::timeout(timeout.0, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(Error::AdapterUnavailable("connection closed before a reply arrived".into())),
            Err(_) => {
                conn.pending.lock().await.remove(&message.header.msg_id);
                Err(Error::AdapterTimeout)
            }
        }
    }
}

#[async_trait::async_trait]
impl ServerAdapter for HttpServerAdapter {
    async fn create_store_id(&self, timeout: Timeout) -> Result<u32> {
        #[derive(serde::Deserialize)]
        struct CreateStoreResponse {
            store_id: u32,
        }

        let deadline = tokio::time::Instant::now() + timeout.0;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(Error::AdapterTimeout);
            }

            let mut request = self.http.post(format!("{}/stores", self.http_base));
            if let Some(token) = &self.auth_token {
                request = request.bearer_auth(token);
            }

            match tokio::time::timeout(remaining, request.send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    return response
                        .json::<CreateStoreResponse>()
                        .await
                        .map(|body| body.store_id)
                        .map_err(|e| Error::AdapterUnavailable(e.to_string()));
                }
                Ok(Ok(response)) => {
                    tracing::warn!(status = %response.status(), attempt, "createStoreId request rejected");
                }
                Ok(Err(error)) => {
                    tracing::warn!(%error, attempt, "createStoreId transport failure");
                }
                Err(_) => return Err(Error::AdapterTimeout),
            }

            if attempt >= MAX_STOREID_ATTEMPTS {
                return Err(Error::AdapterUnavailable(format!(
                    "createStoreId failed after {MAX_STOREID_ATTEMPTS} attempts"
                )));
            }
            let backoff = (BASE_BACKOFF * 2u32.pow(attempt - 1)).min(MAX_BACKOFF).min(remaining);
            tokio::time::sleep(backoff).await;
        }
    }

    async fn register_patch_handler(
        &self,
        store_id: u32,
        handler: Box<dyn Fn(AdapterEvent) + Send + Sync>,
    ) -> Result<Box<dyn Disposable>> {
        let handler: Arc<dyn Fn(AdapterEvent) + Send + Sync> = Arc::from(handler);

        let history_url = format!("{}/stores/{store_id}/history", self.http_base);
        let mut request = self.http.get(&history_url);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let history: PatchHistory = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::AdapterUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| Error::AdapterUnavailable(e.to_string()))?;
        handler(AdapterEvent::History(history));

        let ws_url = format!("{}/stores/{store_id}/ws", self.ws_base);
        let mut ws_request = ws_url
            .into_client_request()
            .map_err(|e| Error::AdapterUnavailable(e.to_string()))?;
        if let Some(token) = &self.auth_token {
            let value = format!("Bearer {token}")
                .parse()
                .map_err(|_| Error::AdapterUnavailable("invalid auth token".into()))?;
            ws_request.headers_mut().insert("authorization", value);
        }
        let (stream, _) = connect_async(ws_request)
            .await
            .map_err(|e| Error::AdapterUnavailable(e.to_string()))?;
        let (write, mut read) = stream.split();

        let connection = Arc::new(Connection { write: Mutex::new(write), pending: Mutex::new(HashMap::new()) });
        *self.conn.lock().await = Some(connection.clone());

        let read_handler = handler.clone();
        let read_conn = connection.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let Ok(WsMessage::Text(text)) = frame else { continue };
                let Ok(raw) = serde_json::from_str::<serde_json::Value>(&text) else { continue };
                let Ok(message) = convergent_store::adapter::validate_wire_message(&raw) else { continue };

                if let Some(parent_id) = message.header.parent_id {
                    if let Some(tx) = read_conn.pending.lock().await.remove(&parent_id) {
                        let _ = tx.send(message);
                        continue;
                    }
                }

                if message.header.msg_type == MessageType::PatchBroadcast {
                    if let Ok(remote) = serde_json::from_value::<RemotePatch>(message.content) {
                        read_handler(AdapterEvent::Remote(remote));
                    }
                }
            }
        });

        struct WsDisposable {
            reader: tokio::task::JoinHandle<()>,
        }
        impl Disposable for WsDisposable {
            fn dispose(self: Box<Self>) {
                self.reader.abort();
            }
        }
        Ok(Box::new(WsDisposable { reader }))
    }

    async fn broadcast_patch(&self, _store_id: u32, patch: Patch) -> Result<String> {
        let message = WireMessage {
            header: MessageHeader::request(MessageType::PatchBroadcast),
            content: serde_json::to_value(&patch).expect("Patch always serializes"),
        };
        let reply = self.send_and_await(message, Timeout::none()).await?;
        let remote: RemotePatch =
            serde_json::from_value(reply.content).map_err(|e| Error::MalformedPatch(e.to_string()))?;
        Ok(remote.adapter_patch_id)
    }

    async fn fetch_patches(&self, patch_ids: Vec<String>, timeout: Timeout) -> Result<Vec<Patch>> {
        let message = WireMessage {
            header: MessageHeader::request(MessageType::FetchPatchRequest),
            content: serde_json::to_value(FetchPatchRequestContent { patch_ids })
                .expect("FetchPatchRequestContent always serializes"),
        };
        let reply = self.send_and_await(message, timeout).await?;
        let content: FetchPatchReplyContent =
            serde_json::from_value(reply.content).map_err(|e| Error::MalformedPatch(e.to_string()))?;
        Ok(content.patches.into_iter().map(|remote| remote.patch).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_store_id_times_out_immediately_with_zero_budget() {
        let adapter = HttpServerAdapter::new("http://127.0.0.1:9".into(), "ws://127.0.0.1:9".into(), None);
        let result = adapter.create_store_id(Timeout(Duration::from_millis(0))).await;
        assert!(matches!(result, Err(Error::AdapterTimeout)));
    }

    #[tokio::test]
    async fn create_store_id_reports_unavailable_once_unreachable_and_retried_out() {
        // Port 9 (discard) refuses TCP connections instantly on loopback in
        // any sandboxed CI environment, so every attempt fails fast and the
        // retry budget exhausts well within a short timeout.
        let adapter = HttpServerAdapter::new("http://127.0.0.1:9".into(), "ws://127.0.0.1:9".into(), None);
        let result = adapter.create_store_id(Timeout(Duration::from_secs(5))).await;
        assert!(matches!(result, Err(Error::AdapterUnavailable(_)) | Err(Error::AdapterTimeout)));
    }

    #[tokio::test]
    async fn fetch_patches_before_connecting_reports_unavailable() {
        let adapter = HttpServerAdapter::new("http://127.0.0.1:9".into(), "ws://127.0.0.1:9".into(), None);
        let result = adapter.fetch_patches(vec!["x".into()], Timeout::none()).await;
        assert!(matches!(result, Err(Error::AdapterUnavailable(_))));
    }
}
