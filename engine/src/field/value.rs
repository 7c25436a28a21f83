//! The `Value` kernel: a last-writer-wins register over any JSON value.
//!
//! Grounded on the teacher's [`Metadata`]-carries-last-writer-OpId idea,
//! narrowed from a whole-record payload down to a single field, and on the
//! `LinearLatestValueWins` register shape (identifier-stamped LWW over a
//! single slot) seen in the pack's CRDT reference material.

use crate::opid::OpId;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Per-field metadata: the OpId of the last-accepted write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueField {
    pub value: Json,
    pub op_id: Option<OpId>,
}

/// The broadcastable fragment: the winning OpId and value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuePatch {
    pub op_id: OpId,
    pub value: Json,
}

/// The `(previous, current)` fragment delivered to observers.
#[derive(Debug, Clone)]
pub struct ValueChange {
    pub previous: Json,
    pub current: Json,
}

impl ValueField {
    pub fn initial() -> Self {
        Self {
            value: Json::Null,
            op_id: None,
        }
    }

    /// Locally originated writes always win: the caller's `op_id` is by
    /// construction greater than any metadata already recorded here.
    pub fn apply_update(&mut self, op_id: OpId, new_value: Json) -> (ValuePatch, ValueChange) {
        let previous = self.value.clone();
        self.value = new_value.clone();
        self.op_id = Some(op_id);
        (
            ValuePatch { op_id, value: new_value.clone() },
            ValueChange { previous, current: new_value },
        )
    }

    /// Accepts `fragment` iff its OpId is strictly greater than the metadata
    /// currently held; otherwise a no-op (last-writer-wins).
    pub fn apply_patch(&mut self, fragment: &ValuePatch) -> Option<ValueChange> {
        let accept = match self.op_id {
            None => true,
            Some(current) => fragment.op_id > current,
        };
        if !accept {
            return None;
        }
        let previous = self.value.clone();
        self.value = fragment.value.clone();
        self.op_id = Some(fragment.op_id);
        Some(ValueChange {
            previous,
            current: fragment.value.clone(),
        })
    }
}
