//! The `Map` kernel: a string-keyed map with per-key last-writer-wins.

use crate::opid::OpId;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;

/// Per-key metadata: the OpId of the last accepted mutation and the
/// last-accepted value, or `None` if the key was deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapField {
    entries: HashMap<String, (OpId, Option<Json>)>,
}

/// The broadcastable fragment: one OpId shared by every key touched in the
/// same local update, plus the per-key `newValue | null` (delete) map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPatch {
    pub op_id: OpId,
    pub changes: HashMap<String, Option<Json>>,
}

/// Per-key `(previous, current)` pairs for the keys touched by a mutation.
#[derive(Debug, Clone)]
pub struct MapChange {
    pub changes: HashMap<String, (Option<Json>, Option<Json>)>,
}

impl MapField {
    pub fn initial() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn current_json(&self) -> Json {
        let map: serde_json::Map<String, Json> = self
            .entries
            .iter()
            .filter_map(|(k, (_, v))| v.clone().map(|v| (k.clone(), v)))
            .collect();
        Json::Object(map)
    }

    fn current_value(&self, key: &str) -> Option<Json> {
        self.entries.get(key).and_then(|(_, v)| v.clone())
    }

    /// Local update: every key in `update` wins unconditionally, since
    /// `op_id` is by construction fresher than anything recorded so far.
    pub fn apply_update(
        &mut self,
        op_id: OpId,
        update: HashMap<String, Option<Json>>,
    ) -> (MapPatch, MapChange) {
        let mut changes = HashMap::new();
        for (key, new_value) in &update {
            let previous = self.current_value(key);
            self.entries.insert(key.clone(), (op_id, new_value.clone()));
            changes.insert(key.clone(), (previous, new_value.clone()));
        }
        (MapPatch { op_id, changes: update }, MapChange { changes })
    }

    /// Remote/replayed patch: per-key LWW against metadata. A key absent
    /// from `self.entries` is treated as having no prior writer, so any
    /// OpId accepts it.
    pub fn apply_patch(&mut self, fragment: &MapPatch) -> Option<MapChange> {
        let mut changes = HashMap::new();
        for (key, new_value) in &fragment.changes {
            let accept = match self.entries.get(key) {
                None => true,
                Some((existing_op, _)) => fragment.op_id > *existing_op,
            };
            if !accept {
                continue;
            }
            let previous = self.current_value(key);
            self.entries
                .insert(key.clone(), (fragment.op_id, new_value.clone()));
            changes.insert(key.clone(), (previous, new_value.clone()));
        }
        if changes.is_empty() {
            None
        } else {
            Some(MapChange { changes })
        }
    }
}

pub(crate) fn merge_patch(a: MapPatch, b: MapPatch) -> MapPatch {
    let mut changes = a.changes;
    for (k, v) in b.changes {
        changes.insert(k, v);
    }
    MapPatch { op_id: b.op_id, changes }
}

pub(crate) fn merge_change(a: MapChange, b: MapChange) -> MapChange {
    let mut changes = a.changes;
    for (k, (_, current)) in b.changes {
        let previous = changes.get(&k).map(|(p, _)| p.clone()).unwrap_or(None);
        changes.insert(k, (previous, current));
    }
    MapChange { changes }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(clock: u64, store: u32) -> OpId {
        OpId::new(clock, store).unwrap()
    }

    fn patch(op_id: OpId, changes: &[(&str, Option<&str>)]) -> MapPatch {
        MapPatch {
            op_id,
            changes: changes
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(Json::from)))
                .collect(),
        }
    }

    /// Spec §8 scenario 1: map out-of-order application.
    #[test]
    fn out_of_order_patch_does_not_clobber_later_values() {
        let mut f = MapField::initial();
        f.apply_patch(&patch(op(0, 1), &[("zero", Some("zeroth")), ("one", Some("first"))]));

        // Patch A: OpId (10, S2), sets {one: null, two: 'a-new-two'}
        f.apply_patch(&patch(op(10, 2), &[("one", None), ("two", Some("a-new-two"))]));

        // Patch B arrives late: OpId (1, S1), sets {zero, one, two}
        f.apply_patch(&patch(
            op(1, 1),
            &[("zero", Some("a-new-none")), ("one", Some("a-new-one")), ("two", Some("second"))],
        ));

        assert_eq!(f.current_value("zero"), Some(Json::from("a-new-none")));
        assert_eq!(f.current_value("one"), None);
        assert_eq!(f.current_value("two"), Some(Json::from("a-new-two")));
    }

    #[test]
    fn idempotent_reapplication() {
        let mut f = MapField::initial();
        let p = patch(op(1, 1), &[("k", Some("v"))]);
        f.apply_patch(&p);
        let second = f.apply_patch(&p);
        assert!(second.is_none());
        assert_eq!(f.current_value("k"), Some(Json::from("v")));
    }

    #[test]
    fn commutative_application_order() {
        let a = patch(op(1, 1), &[("k", Some("a"))]);
        let b = patch(op(2, 1), &[("k", Some("b"))]);

        let mut f1 = MapField::initial();
        f1.apply_patch(&a);
        f1.apply_patch(&b);

        let mut f2 = MapField::initial();
        f2.apply_patch(&b);
        f2.apply_patch(&a);

        assert_eq!(f1.current_value("k"), f2.current_value("k"));
        assert_eq!(f1.current_value("k"), Some(Json::from("b")));
    }
}
