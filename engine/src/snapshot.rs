//! Checkpoint (opaque snapshot, §4.5/§9): the value negotiated between
//! adapter and store to bootstrap a newly-registered peer before streaming
//! subsequent patches.
//!
//! Grounded on the teacher's `StoreSnapshot`: deterministic `BTreeMap`
//! ordering so two checkpoints built from identical state serialize
//! byte-identically, and a `format_version` guard against a future store
//! reading a checkpoint it doesn't understand yet.

use crate::error::{Error, Result};
use crate::field::FieldState;
use crate::{FieldName, RecordId, SchemaId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bumped whenever the checkpoint's structural shape changes incompatibly.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// `schemaId -> recordId -> fieldName -> (value, metadata)`, using
/// `FieldState` directly since it already carries exactly that pair.
pub type CheckpointContent = BTreeMap<SchemaId, BTreeMap<RecordId, BTreeMap<FieldName, FieldState>>>;

/// An opaque, structured snapshot of an entire store's tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub format_version: u32,
    pub content: CheckpointContent,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self { format_version: CHECKPOINT_FORMAT_VERSION, content: CheckpointContent::new() }
    }

    pub fn put_record(&mut self, schema_id: &str, record_id: &str, fields: BTreeMap<FieldName, FieldState>) {
        self.content
            .entry(schema_id.to_string())
            .or_default()
            .insert(record_id.to_string(), fields);
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| Error::MalformedPatch(e.to_string()))
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let checkpoint: Checkpoint =
            serde_json::from_value(value).map_err(|e| Error::MalformedPatch(e.to_string()))?;
        if checkpoint.format_version > CHECKPOINT_FORMAT_VERSION {
            return Err(Error::MalformedPatch(format!(
                "checkpoint format version {} is newer than supported {}",
                checkpoint.format_version, CHECKPOINT_FORMAT_VERSION
            )));
        }
        Ok(checkpoint)
    }

    pub fn record_count(&self) -> usize {
        self.content.values().map(|records| records.len()).sum()
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldKind, ValueField};

    #[test]
    fn deterministic_serialization_regardless_of_insertion_order() {
        let mut a = Checkpoint::new();
        let mut b = Checkpoint::new();

        let mut fields_1 = BTreeMap::new();
        fields_1.insert("name".to_string(), FieldState::initial(FieldKind::Value, "r1"));
        let mut fields_2 = BTreeMap::new();
        fields_2.insert("name".to_string(), FieldState::initial(FieldKind::Value, "r2"));

        a.put_record("users", "r1", fields_1.clone());
        a.put_record("users", "r2", fields_2.clone());

        b.put_record("users", "r2", fields_2);
        b.put_record("users", "r1", fields_1);

        assert_eq!(a.to_json().unwrap(), b.to_json().unwrap());
    }

    #[test]
    fn rejects_future_format_version() {
        let mut value = Checkpoint::new().to_json().unwrap();
        value["formatVersion"] = serde_json::json!(CHECKPOINT_FORMAT_VERSION + 1);
        assert!(Checkpoint::from_json(value).is_err());
    }

    #[test]
    fn record_count_sums_across_schemas() {
        let mut checkpoint = Checkpoint::new();
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), FieldState::Value(ValueField::initial()));
        checkpoint.put_record("users", "r1", fields.clone());
        checkpoint.put_record("posts", "p1", fields);
        assert_eq!(checkpoint.record_count(), 2);
    }
}
