//! Patch: the broadcast unit produced by one committed transaction.

use crate::field::FieldPatch;
use crate::opid::OpId;
use crate::{FieldName, RecordId, SchemaId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-record field fragments, keyed by field name.
pub type RecordPatch = BTreeMap<FieldName, FieldPatch>;

/// Per-schema record fragments, keyed by record id.
pub type SchemaPatch = BTreeMap<RecordId, RecordPatch>;

/// The full content of a patch: `schemaId -> recordId -> fieldName -> fragment`.
pub type PatchContent = BTreeMap<SchemaId, SchemaPatch>;

/// Per-schema record ids a patch removes entirely, keyed by schema id.
pub type RemovedRecords = BTreeMap<SchemaId, BTreeSet<RecordId>>;

/// `(patchId, storeId, content)`: the immutable, broadcastable result of one
/// committed transaction. `removed_records` carries whole-record deletions
/// (e.g. undoing the transaction that created a record) separately from
/// `content`'s per-field fragments, since a removed record has no fields
/// left to stage a fragment against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    pub patch_id: OpId,
    pub store_id: u32,
    pub content: PatchContent,
    #[serde(default)]
    pub removed_records: RemovedRecords,
}

impl Patch {
    pub fn new(patch_id: OpId, store_id: u32) -> Self {
        Self { patch_id, store_id, content: PatchContent::new(), removed_records: RemovedRecords::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.content.values().all(|records| records.values().all(|fields| fields.is_empty()))
            && self.removed_records.values().all(BTreeSet::is_empty)
    }

    /// Stages one field's fragment, coalescing with any fragment already
    /// staged for the same `(schemaId, recordId, fieldName)` within this
    /// transaction via the kernel's `merge`.
    pub fn stage(&mut self, schema_id: &str, record_id: &str, field: &str, fragment: FieldPatch) {
        let records = self.content.entry(schema_id.to_string()).or_default();
        let fields = records.entry(record_id.to_string()).or_default();
        match fields.remove(field) {
            Some(existing) => {
                fields.insert(field.to_string(), FieldPatch::merge(existing, fragment));
            }
            None => {
                fields.insert(field.to_string(), fragment);
            }
        }
    }

    /// Stages the removal of a whole record, broadcast alongside (or instead
    /// of) field fragments so every replica deletes it in one pass.
    pub fn stage_removal(&mut self, schema_id: &str, record_id: &str) {
        self.removed_records.entry(schema_id.to_string()).or_default().insert(record_id.to_string());
    }
}

/// A patch delivered by the adapter from another replica. Carries the
/// adapter-assigned opaque id alongside the embedded `Patch` (whose
/// `patch_id`/`store_id` remain the OpId-derived identity authoritative
/// inside the store, per the spec's resolution of the OpId-vs-adapter-id
/// ambiguity — see `DESIGN.md`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePatch {
    pub adapter_patch_id: String,
    pub patch: Patch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ValueChange, ValuePatch};
    use serde_json::Value as Json;

    #[test]
    fn staging_twice_merges_via_kernel() {
        let mut patch = Patch::new(OpId::new(1, 1).unwrap(), 1);
        let _ = ValueChange { previous: Json::Null, current: Json::Null }; // kept for symmetry with change tests
        patch.stage(
            "users",
            "r1",
            "name",
            FieldPatch::Value(ValuePatch { op_id: OpId::new(1, 1).unwrap(), value: Json::from("a") }),
        );
        patch.stage(
            "users",
            "r1",
            "name",
            FieldPatch::Value(ValuePatch { op_id: OpId::new(2, 1).unwrap(), value: Json::from("b") }),
        );
        let FieldPatch::Value(v) = &patch.content["users"]["r1"]["name"] else {
            panic!("expected value patch");
        };
        assert_eq!(v.value, Json::from("b"));
    }

    #[test]
    fn empty_patch_reports_empty() {
        let patch = Patch::new(OpId::new(1, 1).unwrap(), 1);
        assert!(patch.is_empty());
    }
}
