//! Server adapter (C7): the boundary between a `Store` and the outside
//! world. The trait is transport-agnostic — the concrete, network-backed
//! implementation lives in the `convergent-store-server` crate; this module
//! also provides a synchronous [`LoopbackAdapter`] used by engine-level
//! convergence tests.

use crate::error::{Error, Result};
use crate::patch::{Patch, RemotePatch};
use crate::snapshot::Checkpoint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// A caller-supplied cancellation/timeout handle for the adapter's two
/// asynchronous operations, per spec.md §5 ("createStoreId and fetchPatches
/// MUST support a caller-supplied timeout").
#[derive(Debug, Clone, Copy)]
pub struct Timeout(pub Duration);

impl Timeout {
    pub fn none() -> Self {
        Self(Duration::from_secs(u64::MAX / 2))
    }
}

/// Delivered to a registered patch handler: exactly once per registration,
/// before any subsequent `RemotePatch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchHistory {
    pub checkpoint: Checkpoint,
    pub patches: Vec<Patch>,
}

/// What a registered handler receives from the adapter, in order.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    History(PatchHistory),
    Remote(RemotePatch),
}

/// A disposable subscription: dropping it (or calling `dispose`) stops
/// further delivery. Non-owning — disposing never mutates the adapter's own
/// bookkeeping beyond removing this one registration.
pub trait Disposable: Send {
    fn dispose(self: Box<Self>);
}

/// The contract a `Store` relies on to obtain an id, broadcast, receive, and
/// replay patches. Transport framing, authentication and reconnection are
/// this trait's implementation's business, not the core's (per spec.md §1).
#[async_trait]
pub trait ServerAdapter: Send + Sync {
    /// Returns a unique, non-zero store id. Retries with exponential backoff
    /// on transport failure; once the retry budget is exhausted, fails with
    /// `AdapterUnavailable`. Resolves with `AdapterTimeout` if `timeout` elapses.
    async fn create_store_id(&self, timeout: Timeout) -> Result<u32>;

    /// Registers a handler for this store id. The adapter must deliver
    /// exactly one `PatchHistory`, then any subsequent `RemotePatch`
    /// messages — patches that arrive between registration and the history
    /// being assembled are buffered and flushed with or right after it.
    async fn register_patch_handler(
        &self,
        store_id: u32,
        handler: Box<dyn Fn(AdapterEvent) + Send + Sync>,
    ) -> Result<Box<dyn Disposable>>;

    /// Sends `patch` on the wire, fire-and-forget from the store's
    /// perspective. Returns the adapter-synthesized, opaque patch id, which
    /// is authoritative on the wire (the store's own OpId-derived id remains
    /// authoritative internally).
    async fn broadcast_patch(&self, store_id: u32, patch: Patch) -> Result<String>;

    /// Fetches exactly the requested patches; a missing id is an error for
    /// that request. Resolves with `AdapterTimeout` if `timeout` elapses.
    async fn fetch_patches(&self, patch_ids: Vec<String>, timeout: Timeout) -> Result<Vec<Patch>>;
}

/// `Store`'s synchronous hook for broadcasting a committed or undo/redo
/// patch, kept separate from [`ServerAdapter`]. Per spec.md §5,
/// `broadcastPatch` "returns synchronously; the actual network send may be
/// asynchronous inside the adapter" — the store itself performs no I/O and
/// never awaits, so this trait's one method is plain and synchronous. A real
/// adapter implements it by handing the patch to its own async machinery
/// (a channel, a spawned task) without blocking the caller.
pub trait PatchSink: Send + Sync {
    fn broadcast(&self, store_id: u32, patch: Patch);
}

/// Wire message envelope (spec.md §6): `{ header: { msgId, msgType,
/// parentId? }, content }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub header: MessageHeader,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHeader {
    pub msg_id: Uuid,
    pub msg_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

impl MessageHeader {
    pub fn request(msg_type: MessageType) -> Self {
        Self { msg_id: Uuid::new_v4(), msg_type, parent_id: None }
    }

    pub fn reply(msg_type: MessageType, parent_id: Uuid) -> Self {
        Self { msg_id: Uuid::new_v4(), msg_type, parent_id: Some(parent_id) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageType {
    StoreidRequest,
    StoreidReply,
    PatchBroadcast,
    FetchPatchRequest,
    FetchPatchReply,
}

/// Validates an inbound [`WireMessage`], used by adapter implementations
/// before acting on it. Unknown or malformed messages are the caller's
/// responsibility to log and discard, never to propagate as a crash.
pub fn validate_wire_message(raw: &serde_json::Value) -> Result<WireMessage> {
    serde_json::from_value(raw.clone()).map_err(|e| Error::MalformedPatch(e.to_string()))
}
