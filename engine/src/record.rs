//! Record (C4, part 1): one identified row with per-field value + metadata.

use crate::error::{Error, Result};
use crate::field::{FieldState, FieldUpdate, OpIdSource};
use crate::field::{FieldChange, FieldPatch};
use crate::opid::OpId;
use crate::schema::RecordSchema;
use crate::{FieldName, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;

/// One identified row, holding the current `(value, metadata)` for every
/// field its schema declares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    schema_id: String,
    fields: HashMap<FieldName, FieldState>,
}

impl Record {
    /// Constructs a freshly created record with every field at its kernel's
    /// initial value, per the schema's field list.
    pub fn new(schema: &RecordSchema, id: RecordId) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|f| (f.name.clone(), FieldState::initial(f.kind, &id)))
            .collect();
        Self { id, schema_id: schema.schema_id.clone(), fields }
    }

    /// Constant-time read of a field's current value.
    pub fn get(&self, field: &str) -> Result<Json> {
        self.field_state(field).map(FieldState::current_json)
    }

    pub fn field_state(&self, field: &str) -> Result<&FieldState> {
        self.fields.get(field).ok_or_else(|| Error::FieldUnknown {
            schema: self.schema_id.clone(),
            field: field.to_string(),
        })
    }

    pub fn field_state_mut(&mut self, field: &str) -> Result<&mut FieldState> {
        self.fields.get_mut(field).ok_or_else(|| Error::FieldUnknown {
            schema: self.schema_id.clone(),
            field: field.to_string(),
        })
    }

    /// Applies a locally originated update to one field, permitted only
    /// inside a transaction (enforced by the caller, `Store`). `source`
    /// mints any additional OpIds a `List`/`Text` multi-element mutation
    /// needs beyond `op_id`.
    pub fn update(
        &mut self,
        field: &str,
        op_id: OpId,
        update: FieldUpdate,
        source: &mut dyn OpIdSource,
    ) -> Result<(FieldPatch, FieldChange)> {
        self.field_state_mut(field)?.apply_update(op_id, update, source)
    }

    /// Applies a remote (or replayed local) patch fragment to one field.
    pub fn apply_field_patch(&mut self, field: &str, patch: &FieldPatch) -> Result<Option<FieldChange>> {
        self.field_state_mut(field)?.apply_patch(patch)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &FieldName> {
        self.fields.keys()
    }

    /// Reconstructs a record from a checkpoint's `fieldName -> FieldState`
    /// map (used by `Store::bootstrap_from_history`).
    pub fn from_fields(id: RecordId, schema_id: String, fields: HashMap<FieldName, FieldState>) -> Self {
        Self { id, schema_id, fields }
    }

    /// Overwrites one field's state outright, used by `cancelTransaction` to
    /// roll back to the pre-transaction snapshot.
    pub fn restore_field(&mut self, field: &str, state: FieldState) {
        self.fields.insert(field.to_string(), state);
    }
}
