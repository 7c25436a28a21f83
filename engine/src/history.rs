//! History (C6): bounded undo/redo stacks of local patches, and the logic
//! that recomputes an inverse patch against current metadata.
//!
//! Because concurrent remote patches may have advanced metadata since a
//! local patch was committed, the inverse is *recomputed* at undo time from
//! the original patch plus the change snapshot taken when it committed,
//! rather than stored verbatim (per spec.md §4.6).

use crate::change::{ChangeNotification, TableEvent};
use crate::field::{FieldChange, FieldPatch};
use crate::opid::{OpId, OpIdFactory};
use crate::patch::{Patch, PatchContent};
use crate::{RecordId, SchemaId};
use std::collections::{HashSet, VecDeque};

/// Default bound on the undo/redo stacks (the spec leaves this an
/// implementer's choice — see `DESIGN.md`'s Open Question decision).
pub const DEFAULT_HISTORY_BOUND: usize = 100;

/// One retained local patch plus the change snapshot it produced, enough to
/// recompute its inverse at any later point.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub patch_id: OpId,
    pub patch: Patch,
    pub change: ChangeNotification,
}

/// Bounded undo/redo stacks. Pushing past `bound` evicts the oldest entry
/// without corrupting the remaining ones — eviction only narrows how far
/// back undo can reach, never the correctness of what remains.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    bound: usize,
}

impl History {
    pub fn new(bound: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            bound,
        }
    }

    /// Records a freshly committed local transaction: pushes onto the undo
    /// stack and clears the redo stack (new local history invalidates any
    /// previously undone future).
    pub fn record_committed(&mut self, entry: HistoryEntry) {
        push_bounded(&mut self.undo_stack, entry, self.bound);
        self.redo_stack.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn pop_undo(&mut self) -> Option<HistoryEntry> {
        self.undo_stack.pop_back()
    }

    pub fn pop_redo(&mut self) -> Option<HistoryEntry> {
        self.redo_stack.pop_back()
    }

    /// Pushes the patch produced by an undo onto the redo stack.
    pub fn push_redo(&mut self, entry: HistoryEntry) {
        push_bounded(&mut self.redo_stack, entry, self.bound);
    }

    /// Pushes the patch produced by a redo back onto the undo stack.
    pub fn push_undo(&mut self, entry: HistoryEntry) {
        push_bounded(&mut self.undo_stack, entry, self.bound);
    }
}

fn push_bounded(stack: &mut VecDeque<HistoryEntry>, entry: HistoryEntry, bound: usize) {
    stack.push_back(entry);
    while stack.len() > bound {
        stack.pop_front();
    }
}

/// The inverse of a committed transaction: field-level fragments to apply,
/// plus the record-level table events the field fragments alone can't
/// express.
pub struct Inverse {
    pub content: PatchContent,
    /// Records to delete outright — the inverse of a transaction that
    /// created them (spec.md §8 scenario 4: undoing a creating transaction
    /// removes the record, not just its fields).
    pub removals: Vec<(SchemaId, RecordId)>,
    /// Records a prior removal deleted that this inverse recreates; `content`
    /// already carries the field fragments that repopulate them; this list
    /// only tags the resulting change notification so a later undo can
    /// remove them again.
    pub recreations: Vec<(SchemaId, RecordId)>,
}

/// Computes the inverse of `entry`'s patch against the metadata it produced,
/// minting fresh OpIds from `factory` where the kernel needs one (`Value`
/// and `Map` always mint fresh; `List`/`Text` reuse the original valueIds,
/// since positions never change once generated).
pub fn build_inverse(entry: &HistoryEntry, factory: &mut OpIdFactory) -> Inverse {
    let mut content = PatchContent::new();
    let mut removals = Vec::new();
    let mut recreations = Vec::new();
    let mut removed_this_round: HashSet<(SchemaId, RecordId)> = HashSet::new();

    for event in &entry.change.table_events {
        match event {
            TableEvent::RecordAdded { schema_id, record_id } => {
                removals.push((schema_id.clone(), record_id.clone()));
                removed_this_round.insert((schema_id.clone(), record_id.clone()));
            }
            TableEvent::RecordRemoved { schema_id, record_id } => {
                recreations.push((schema_id.clone(), record_id.clone()));
            }
        }
    }

    for (schema_id, records) in &entry.patch.content {
        for (record_id, fields) in records {
            if removed_this_round.contains(&(schema_id.clone(), record_id.clone())) {
                // The record this transaction created is being deleted
                // outright; there are no fields left to invert.
                continue;
            }
            for (field_name, fragment) in fields {
                let change = entry
                    .change
                    .content
                    .get(schema_id)
                    .and_then(|r| r.get(record_id))
                    .and_then(|f| f.get(field_name));
                let Some(change) = change else { continue };
                let inverse_fragment = invert_fragment(fragment, change, factory);
                content
                    .entry(schema_id.clone())
                    .or_default()
                    .entry(record_id.clone())
                    .or_default()
                    .insert(field_name.clone(), inverse_fragment);
            }
        }
    }
    Inverse { content, removals, recreations }
}

fn invert_fragment(fragment: &FieldPatch, change: &FieldChange, factory: &mut OpIdFactory) -> FieldPatch {
    match (fragment, change) {
        (FieldPatch::Value(_), FieldChange::Value(c)) => {
            FieldPatch::Value(crate::field::ValuePatch { op_id: factory.next(), value: c.previous.clone() })
        }
        (FieldPatch::Map(p), FieldChange::Map(c)) => {
            let changes = p
                .changes
                .keys()
                .map(|k| {
                    let previous = c.changes.get(k).and_then(|(prev, _)| prev.clone());
                    (k.clone(), previous)
                })
                .collect();
            FieldPatch::Map(crate::field::MapPatch { op_id: factory.next(), changes })
        }
        (FieldPatch::List(p), _) => {
            let entries = p
                .entries
                .iter()
                .rev()
                .map(|entry| match entry {
                    crate::field::ListEntryPatch::Insert { op_id, position, value } => {
                        crate::field::ListEntryPatch::Remove {
                            op_id: *op_id,
                            value_id: *op_id,
                            position: position.clone(),
                            value: value.clone(),
                        }
                    }
                    crate::field::ListEntryPatch::Remove { value_id, position, value, .. } => {
                        crate::field::ListEntryPatch::Insert {
                            op_id: *value_id,
                            position: position.clone(),
                            value: value.clone(),
                        }
                    }
                })
                .collect();
            FieldPatch::List(crate::field::ListPatch { entries })
        }
        (FieldPatch::Text(p), _) => {
            let runs = p
                .runs
                .iter()
                .rev()
                .map(|run| match run {
                    crate::field::TextRun::Insert { chars } => crate::field::TextRun::Remove {
                        op_id: chars.first().map(|(id, _, _)| *id).unwrap_or_else(|| factory.next()),
                        value_id: chars.first().map(|(id, _, _)| *id).unwrap_or_else(|| factory.next()),
                        position: chars.first().map(|(_, p, _)| p.clone()).unwrap_or(crate::position::FractionalPosition::Min),
                        ch: chars.first().map(|(_, _, c)| *c).unwrap_or('\0'),
                    },
                    crate::field::TextRun::Remove { value_id, position, ch, .. } => crate::field::TextRun::Insert {
                        chars: vec![(*value_id, position.clone(), *ch)],
                    },
                })
                .collect();
            FieldPatch::Text(crate::field::TextPatch { runs })
        }
        _ => fragment.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldChange, FieldPatch, ValueChange, ValuePatch};
    use crate::patch::Patch;
    use serde_json::Value as Json;

    #[test]
    fn bound_evicts_oldest_without_corrupting_rest() {
        let mut history = History::new(2);
        for i in 1..=3u64 {
            let patch = Patch::new(OpId::new(i, 1).unwrap(), 1);
            history.record_committed(HistoryEntry {
                patch_id: patch.patch_id,
                patch,
                change: ChangeNotification::new(),
            });
        }
        assert!(history.can_undo());
        let first_popped = history.pop_undo().unwrap();
        let second_popped = history.pop_undo().unwrap();
        assert_eq!(first_popped.patch_id, OpId::new(3, 1).unwrap());
        assert_eq!(second_popped.patch_id, OpId::new(2, 1).unwrap());
        assert!(history.pop_undo().is_none()); // entry for clock=1 was evicted
    }

    #[test]
    fn inverting_a_value_patch_restores_previous() {
        let mut patch = Patch::new(OpId::new(2, 1).unwrap(), 1);
        patch.stage(
            "users",
            "r1",
            "name",
            FieldPatch::Value(ValuePatch { op_id: OpId::new(2, 1).unwrap(), value: Json::from("new") }),
        );
        let mut change = ChangeNotification::new();
        change.stage(
            "users",
            "r1",
            "name",
            FieldChange::Value(ValueChange { previous: Json::from("old"), current: Json::from("new") }),
        );
        let entry = HistoryEntry { patch_id: patch.patch_id, patch, change };
        let mut factory = OpIdFactory::new(1).unwrap();
        factory.observe(2);
        let inverse = build_inverse(&entry, &mut factory);
        let FieldPatch::Value(v) = &inverse.content["users"]["r1"]["name"] else { panic!() };
        assert_eq!(v.value, Json::from("old"));
        assert!(v.op_id > OpId::new(2, 1).unwrap());
        assert!(inverse.removals.is_empty());
        assert!(inverse.recreations.is_empty());
    }

    #[test]
    fn inverting_a_record_creation_removes_it_instead_of_inverting_fields() {
        let mut patch = Patch::new(OpId::new(2, 1).unwrap(), 1);
        patch.stage(
            "users",
            "r1",
            "name",
            FieldPatch::Value(ValuePatch { op_id: OpId::new(2, 1).unwrap(), value: Json::from("v0") }),
        );
        let mut change = ChangeNotification::new();
        change.stage(
            "users",
            "r1",
            "name",
            FieldChange::Value(ValueChange { previous: Json::Null, current: Json::from("v0") }),
        );
        change.table_events.push(TableEvent::RecordAdded { schema_id: "users".into(), record_id: "r1".into() });
        let entry = HistoryEntry { patch_id: patch.patch_id, patch, change };
        let mut factory = OpIdFactory::new(1).unwrap();
        factory.observe(2);

        let inverse = build_inverse(&entry, &mut factory);
        assert_eq!(inverse.removals, vec![("users".to_string(), "r1".to_string())]);
        assert!(inverse.recreations.is_empty());
        // no field fragment is emitted for a record being deleted outright
        assert!(inverse.content.get("users").and_then(|r| r.get("r1")).is_none());
    }
}
