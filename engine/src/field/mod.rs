//! Field kernels (C3): the closed set of mergeable field types.
//!
//! Each kind — [`Value`](value), [`Map`](map), [`List`](list), [`Text`](text),
//! and [`PrimaryKey`](primary_key) — owns its value representation, its
//! metadata, and the four operations every kernel must provide:
//! `initial_value`/`initial_metadata`, `apply_update`, `apply_patch`, and
//! `merge`/`merge_change`. There is no inheritance hierarchy here: dispatch
//! is by the `kind` tag on [`FieldState`]/[`FieldPatch`]/[`FieldChange`],
//! matching the "tagged-variant field kind" redesign called for over the
//! source's open-ended per-field subclass tree.

pub mod list;
pub mod map;
pub mod primary_key;
pub mod text;
pub mod value;

pub use list::{ListChange, ListEntryPatch, ListField, ListPatch, ListUpdate, OpIdSource};
pub use map::{MapChange, MapField, MapPatch, MapUpdate};
pub use primary_key::PrimaryKeyField;
pub use text::{TextChange, TextField, TextPatch, TextRun, TextUpdate};
pub use value::{ValueChange, ValueField, ValuePatch};

use crate::error::Result;
use crate::opid::OpId;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The closed set of field kinds a schema may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    PrimaryKey,
    Value,
    List,
    Map,
    Text,
}

/// The locally-supplied update payload for one field, shaped per kind.
#[derive(Debug, Clone)]
pub enum FieldUpdate {
    Value(Json),
    Map(std::collections::HashMap<String, Option<Json>>),
    List(ListUpdate),
    Text(TextUpdate),
}

/// The live `(value, metadata)` pair for one field on one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldState {
    PrimaryKey(PrimaryKeyField),
    Value(ValueField),
    Map(MapField),
    List(ListField),
    Text(TextField),
}

/// The broadcastable per-field fragment of a [`Patch`](crate::patch::Patch).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldPatch {
    Value(ValuePatch),
    Map(MapPatch),
    List(ListPatch),
    Text(TextPatch),
}

/// The `(previous, current)` fragment delivered to local observers.
#[derive(Debug, Clone)]
pub enum FieldChange {
    Value(ValueChange),
    Map(MapChange),
    List(ListChange),
    Text(TextChange),
}

impl FieldState {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldState::PrimaryKey(_) => FieldKind::PrimaryKey,
            FieldState::Value(_) => FieldKind::Value,
            FieldState::Map(_) => FieldKind::Map,
            FieldState::List(_) => FieldKind::List,
            FieldState::Text(_) => FieldKind::Text,
        }
    }

    /// Constructs the kernel-defined initial state for a freshly created record.
    pub fn initial(kind: FieldKind, record_id: &str) -> FieldState {
        match kind {
            FieldKind::PrimaryKey => FieldState::PrimaryKey(PrimaryKeyField::new(record_id)),
            FieldKind::Value => FieldState::Value(ValueField::initial()),
            FieldKind::Map => FieldState::Map(MapField::initial()),
            FieldKind::List => FieldState::List(ListField::initial()),
            FieldKind::Text => FieldState::Text(TextField::initial()),
        }
    }

    /// The current value as JSON, for `Record::get`.
    pub fn current_json(&self) -> Json {
        match self {
            FieldState::PrimaryKey(f) => Json::String(f.id.clone()),
            FieldState::Value(f) => f.value.clone(),
            FieldState::Map(f) => f.current_json(),
            FieldState::List(f) => f.current_json(),
            FieldState::Text(f) => Json::String(f.current_string()),
        }
    }

    /// Applies a locally originated update, producing the patch and change
    /// fragments to stage for the enclosing transaction. `op_id` is the
    /// OpId to use for kernels that mint exactly one (`Value`, `Map`);
    /// `source` mints any further OpIds a multi-element `List`/`Text`
    /// mutation needs (see [`OpIdSource`]).
    pub fn apply_update(
        &mut self,
        op_id: OpId,
        update: FieldUpdate,
        source: &mut dyn OpIdSource,
    ) -> Result<(FieldPatch, FieldChange)> {
        match (self, update) {
            (FieldState::Value(f), FieldUpdate::Value(v)) => {
                let (patch, change) = f.apply_update(op_id, v);
                Ok((FieldPatch::Value(patch), FieldChange::Value(change)))
            }
            (FieldState::Map(f), FieldUpdate::Map(u)) => {
                let (patch, change) = f.apply_update(op_id, u);
                Ok((FieldPatch::Map(patch), FieldChange::Map(change)))
            }
            (FieldState::List(f), FieldUpdate::List(u)) => {
                let (patch, change) = f.apply_update(op_id, u, source)?;
                Ok((FieldPatch::List(patch), FieldChange::List(change)))
            }
            (FieldState::Text(f), FieldUpdate::Text(u)) => {
                let (patch, change) = f.apply_update(op_id, u, source)?;
                Ok((FieldPatch::Text(patch), FieldChange::Text(change)))
            }
            (FieldState::PrimaryKey(_), _) => Err(crate::error::Error::MalformedPatch(
                "primary key fields are not directly mutable".into(),
            )),
            _ => Err(crate::error::Error::MalformedPatch(
                "update payload kind does not match field kind".into(),
            )),
        }
    }

    /// Applies a remote (or replayed local) patch fragment. Returns `None`
    /// when the fragment was accepted but produced no visible change (e.g. a
    /// stale LWW write), or when it was rejected outright.
    pub fn apply_patch(&mut self, patch: &FieldPatch) -> Result<Option<FieldChange>> {
        match (self, patch) {
            (FieldState::Value(f), FieldPatch::Value(p)) => Ok(f.apply_patch(p).map(FieldChange::Value)),
            (FieldState::Map(f), FieldPatch::Map(p)) => Ok(f.apply_patch(p).map(FieldChange::Map)),
            (FieldState::List(f), FieldPatch::List(p)) => Ok(f.apply_patch(p).map(FieldChange::List)),
            (FieldState::Text(f), FieldPatch::Text(p)) => Ok(f.apply_patch(p).map(FieldChange::Text)),
            (FieldState::PrimaryKey(_), _) => Ok(None),
            _ => Err(crate::error::Error::MalformedPatch(
                "patch fragment kind does not match field kind".into(),
            )),
        }
    }
}

impl FieldPatch {
    /// Coalesces two fragments produced for the same field within one
    /// transaction into the single fragment that has the same net effect.
    pub fn merge(a: FieldPatch, b: FieldPatch) -> FieldPatch {
        match (a, b) {
            (FieldPatch::Value(_), FieldPatch::Value(b)) => FieldPatch::Value(b),
            (FieldPatch::Map(a), FieldPatch::Map(b)) => FieldPatch::Map(map::merge_patch(a, b)),
            (FieldPatch::List(a), FieldPatch::List(b)) => FieldPatch::List(list::merge_patch(a, b)),
            (FieldPatch::Text(a), FieldPatch::Text(b)) => FieldPatch::Text(text::merge_patch(a, b)),
            (_, b) => b,
        }
    }
}

impl FieldChange {
    /// Coalesces two change fragments for the same field within one
    /// transaction, preserving the pre-transaction `previous` and the
    /// post-transaction `current`.
    pub fn merge(a: FieldChange, b: FieldChange) -> FieldChange {
        match (a, b) {
            (FieldChange::Value(a), FieldChange::Value(b)) => FieldChange::Value(ValueChange {
                previous: a.previous,
                current: b.current,
            }),
            (FieldChange::Map(a), FieldChange::Map(b)) => FieldChange::Map(map::merge_change(a, b)),
            (FieldChange::List(a), FieldChange::List(b)) => FieldChange::List(list::merge_change(a, b)),
            (FieldChange::Text(a), FieldChange::Text(b)) => FieldChange::Text(text::merge_change(a, b)),
            (_, b) => b,
        }
    }
}
