//! Change notification (C8): the per-transaction, per-field `(previous,
//! current)` snapshot delivered to observers, plus table-level add/remove
//! events observers commonly care about.

use crate::field::FieldChange;
use crate::{FieldName, RecordId, SchemaId};
use std::collections::HashMap;

/// Per-record field changes, keyed by field name.
pub type RecordChange = HashMap<FieldName, FieldChange>;

/// Per-schema record changes, keyed by record id.
pub type SchemaChange = HashMap<RecordId, RecordChange>;

/// A table-level event accompanying a change notification: a record was
/// created or removed this transaction (the spec's `type: 'table'` /
/// `record-added` notification shape, generalized to one event list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    RecordAdded { schema_id: SchemaId, record_id: RecordId },
    RecordRemoved { schema_id: SchemaId, record_id: RecordId },
}

/// The coalesced notification emitted once per transaction (or once per
/// applied remote patch / patch-history replay) to registered observers.
#[derive(Debug, Clone, Default)]
pub struct ChangeNotification {
    pub content: HashMap<SchemaId, SchemaChange>,
    pub table_events: Vec<TableEvent>,
}

impl ChangeNotification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.table_events.is_empty()
            && self
                .content
                .values()
                .all(|schema_change| schema_change.values().all(|record_change| record_change.is_empty()))
    }

    /// Stages one field's change, coalescing with anything already staged
    /// for the same `(schemaId, recordId, fieldName)` via `mergeChange`.
    pub fn stage(&mut self, schema_id: &str, record_id: &str, field: &str, change: FieldChange) {
        let records = self.content.entry(schema_id.to_string()).or_default();
        let fields = records.entry(record_id.to_string()).or_default();
        match fields.remove(field) {
            Some(existing) => {
                fields.insert(field.to_string(), FieldChange::merge(existing, change));
            }
            None => {
                fields.insert(field.to_string(), change);
            }
        }
    }
}

/// A handle returned by `Store::subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ValueChange};
    use serde_json::Value as Json;

    #[test]
    fn staging_merges_previous_and_current() {
        let mut notification = ChangeNotification::new();
        notification.stage(
            "users",
            "r1",
            "name",
            crate::field::FieldChange::Value(ValueChange { previous: Json::Null, current: Json::from("a") }),
        );
        notification.stage(
            "users",
            "r1",
            "name",
            crate::field::FieldChange::Value(ValueChange { previous: Json::from("a"), current: Json::from("b") }),
        );
        let crate::field::FieldChange::Value(merged) = &notification.content["users"]["r1"]["name"] else {
            panic!("expected value change");
        };
        assert_eq!(merged.previous, Json::Null);
        assert_eq!(merged.current, Json::from("b"));
    }
}
