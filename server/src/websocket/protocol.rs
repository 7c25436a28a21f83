//! Wire-content shapes carried inside a `convergent_store::adapter::WireMessage`.
//!
//! The envelope (`header`/`content`) and the five `MessageType` variants are
//! defined once, in the engine crate, so the server and every store agree on
//! them byte-for-byte; this module only defines what goes in `content` for
//! each message type and provides constructors for the replies this server
//! sends.

use convergent_store::adapter::{MessageHeader, MessageType, WireMessage};
use convergent_store::{Patch, RemotePatch};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreidReplyContent {
    pub store_id: u32,
}

/// `patch_ids` are opaque adapter-assigned strings, matching
/// `RemotePatch::adapter_patch_id` and `ServerAdapter::fetch_patches`'s
/// `Vec<String>` — not `Uuid`, even though this server happens to mint them
/// as UUIDs internally.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPatchRequestContent {
    pub patch_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPatchReplyContent {
    pub patches: Vec<RemotePatch>,
}

/// Build a `storeid-reply` in response to `request_id`.
pub fn storeid_reply(request_id: Uuid, store_id: u32) -> WireMessage {
    WireMessage {
        header: MessageHeader::reply(MessageType::StoreidReply, request_id),
        content: serde_json::to_value(StoreidReplyContent { store_id })
            .expect("StoreidReplyContent always serializes"),
    }
}

/// Build a `patch-broadcast` fanned out to other connected stores. Not a
/// reply — it has no `parent_id`, since nothing requested it.
pub fn patch_broadcast(remote: &RemotePatch) -> WireMessage {
    WireMessage {
        header: MessageHeader::request(MessageType::PatchBroadcast),
        content: serde_json::to_value(remote).expect("RemotePatch always serializes"),
    }
}

/// Build a `patch-broadcast` acknowledgement back to the origin connection,
/// replying with the server-assigned adapter id for the patch it just sent.
pub fn patch_broadcast_ack(request_id: Uuid, remote: &RemotePatch) -> WireMessage {
    WireMessage {
        header: MessageHeader::reply(MessageType::PatchBroadcast, request_id),
        content: serde_json::to_value(remote).expect("RemotePatch always serializes"),
    }
}

/// Build a `fetch-patch-reply` in response to `request_id`.
pub fn fetch_patch_reply(request_id: Uuid, patches: Vec<RemotePatch>) -> WireMessage {
    WireMessage {
        header: MessageHeader::reply(MessageType::FetchPatchReply, request_id),
        content: serde_json::to_value(FetchPatchReplyContent { patches })
            .expect("FetchPatchReplyContent always serializes"),
    }
}

/// Parse a broadcast's content back into a `Patch` for persistence. Incoming
/// `patch-broadcast` frames carry a bare `Patch`, not a `RemotePatch` — the
/// adapter id is this server's to assign, not the sender's.
pub fn parse_patch_broadcast(message: &WireMessage) -> Result<Patch, serde_json::Error> {
    serde_json::from_value(message.content.clone())
}

pub fn parse_fetch_patch_request(
    message: &WireMessage,
) -> Result<FetchPatchRequestContent, serde_json::Error> {
    serde_json::from_value(message.content.clone())
}
