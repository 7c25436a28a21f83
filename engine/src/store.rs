//! Store (C5): the transactional state machine tying schemas, tables, field
//! kernels, history and the adapter boundary together.
//!
//! Mutation is only legal inside a transaction (`Idle -> InTransaction`);
//! `endTransaction` assembles everything staged into one [`Patch`], pushes it
//! onto [`History`]'s undo stack, hands it to the configured [`PatchSink`],
//! and notifies observers with one coalesced [`ChangeNotification`].
//! `cancelTransaction` rolls every touched field back to the snapshot taken
//! the moment it was first touched this transaction, and removes any record
//! created during it outright. Remote patches arriving mid-transaction are
//! queued and replayed immediately after the transaction resolves, so a
//! transaction's own reads never observe interleaved remote writes.

use crate::adapter::{PatchHistory, PatchSink};
use crate::change::{ChangeNotification, SubscriptionId, TableEvent};
use crate::error::{Error, Result};
use crate::field::{FieldState, FieldUpdate};
use crate::history::{self, History, HistoryEntry, DEFAULT_HISTORY_BOUND};
use crate::opid::{OpId, OpIdFactory};
use crate::patch::{Patch, RemotePatch};
use crate::record::Record;
use crate::schema::SchemaRegistry;
use crate::snapshot::Checkpoint;
use crate::table::Table;
use crate::{FieldName, RecordId, SchemaId};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A registered change observer. Panics inside one are caught and logged so a
/// single misbehaving observer cannot break notification for the rest.
type Observer = Box<dyn Fn(&ChangeNotification) + Send + Sync>;

enum TransactionState {
    Idle,
    InTransaction { buffer: TransactionBuffer, queued_remote: Vec<RemotePatch> },
}

/// Everything staged during one open transaction: the patch and change being
/// assembled, a lazily captured pre-image per touched field (for rollback),
/// and the ids of any records the transaction itself created (for rollback
/// removal, since those records have no prior state to restore).
struct TransactionBuffer {
    patch: Patch,
    change: ChangeNotification,
    snapshots: HashMap<(SchemaId, RecordId, FieldName), FieldState>,
    created_records: Vec<(SchemaId, RecordId)>,
}

impl TransactionBuffer {
    fn new(patch_id: OpId, store_id: u32) -> Self {
        Self {
            patch: Patch::new(patch_id, store_id),
            change: ChangeNotification::new(),
            snapshots: HashMap::new(),
            created_records: Vec::new(),
        }
    }
}

/// The transactional state machine (C5): schemas, tables, the mutation
/// clock, undo/redo history, observers, and an optional synchronous
/// broadcast hook.
pub struct Store {
    store_id: u32,
    factory: OpIdFactory,
    schemas: SchemaRegistry,
    tables: HashMap<SchemaId, Table>,
    state: TransactionState,
    history: History,
    observers: HashMap<u64, Observer>,
    next_subscription_id: u64,
    sink: Option<Arc<dyn PatchSink>>,
}

impl Store {
    /// Constructs an empty store for `store_id`, with one table per
    /// registered schema. `store_id` is normally obtained from
    /// `ServerAdapter::create_store_id` by the caller before this is called.
    pub fn new(store_id: u32, schemas: SchemaRegistry) -> Result<Self> {
        let factory = OpIdFactory::new(store_id)?;
        let tables = schemas
            .iter()
            .map(|schema| (schema.schema_id.clone(), Table::new(schema.clone())))
            .collect();
        Ok(Self {
            store_id,
            factory,
            schemas,
            tables,
            state: TransactionState::Idle,
            history: History::new(DEFAULT_HISTORY_BOUND),
            observers: HashMap::new(),
            next_subscription_id: 0,
            sink: None,
        })
    }

    /// Attaches a synchronous broadcast hook, used to fire committed and
    /// undo/redo patches onto the wire without the store itself awaiting
    /// anything (see [`PatchSink`]).
    pub fn with_sink(mut self, sink: Arc<dyn PatchSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn store_id(&self) -> u32 {
        self.store_id
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn table(&self, schema_id: &str) -> Result<&Table> {
        self.tables.get(schema_id).ok_or_else(|| Error::SchemaUnknown(schema_id.to_string()))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Registers an observer, called once per committed transaction, applied
    /// remote patch, patch-history replay, undo, or redo that produced a
    /// non-empty change.
    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        self.observers.insert(id, observer);
        SubscriptionId(id)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.observers.remove(&id.0);
    }

    /// Opens a transaction, failing with [`Error::NestedTransaction`] if one
    /// is already open. Returns the OpId that will identify the resulting
    /// patch (the first OpId minted within it — a transaction touching
    /// several list/text elements mints further OpIds as it goes).
    pub fn begin_transaction(&mut self) -> Result<OpId> {
        if matches!(self.state, TransactionState::InTransaction { .. }) {
            return Err(Error::NestedTransaction);
        }
        let patch_id = self.factory.next();
        self.state = TransactionState::InTransaction {
            buffer: TransactionBuffer::new(patch_id, self.store_id),
            queued_remote: Vec::new(),
        };
        Ok(patch_id)
    }

    /// Creates a new record, permitted only inside a transaction.
    pub fn create_record(&mut self, schema_id: &str, record_id: Option<RecordId>) -> Result<RecordId> {
        if !matches!(self.state, TransactionState::InTransaction { .. }) {
            return Err(Error::MutationOutsideTransaction);
        }
        let id = record_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let table = self.tables.get_mut(schema_id).ok_or_else(|| Error::SchemaUnknown(schema_id.to_string()))?;
        table.create(id.clone())?;

        let TransactionState::InTransaction { buffer, .. } = &mut self.state else {
            unreachable!("checked above")
        };
        buffer.created_records.push((schema_id.to_string(), id.clone()));
        buffer.change.table_events.push(TableEvent::RecordAdded { schema_id: schema_id.to_string(), record_id: id.clone() });
        Ok(id)
    }

    /// Applies a locally originated update to one field of an existing
    /// record, permitted only inside a transaction.
    pub fn update_field(&mut self, schema_id: &str, record_id: &str, field: &str, update: FieldUpdate) -> Result<()> {
        if !matches!(self.state, TransactionState::InTransaction { .. }) {
            return Err(Error::MutationOutsideTransaction);
        }
        let table = self.tables.get_mut(schema_id).ok_or_else(|| Error::SchemaUnknown(schema_id.to_string()))?;
        let record = table.get_mut(record_id).ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;

        let key = (schema_id.to_string(), record_id.to_string(), field.to_string());
        let TransactionState::InTransaction { buffer, .. } = &mut self.state else {
            unreachable!("checked above")
        };
        if !buffer.snapshots.contains_key(&key) {
            buffer.snapshots.insert(key, record.field_state(field)?.clone());
        }

        let op_id = self.factory.next();
        let (patch_fragment, change_fragment) = record.update(field, op_id, update, &mut self.factory)?;

        let TransactionState::InTransaction { buffer, .. } = &mut self.state else {
            unreachable!("checked above")
        };
        buffer.patch.stage(schema_id, record_id, field, patch_fragment);
        buffer.change.stage(schema_id, record_id, field, change_fragment);
        Ok(())
    }

    /// Reads a field's current value, legal in either state — including
    /// mid-transaction, where it reflects the transaction's own writes.
    pub fn get(&self, schema_id: &str, record_id: &str, field: &str) -> Result<Json> {
        let table = self.tables.get(schema_id).ok_or_else(|| Error::SchemaUnknown(schema_id.to_string()))?;
        let record = table.get(record_id).ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;
        record.get(field)
    }

    /// Commits the open transaction: assembles the staged patch, pushes it
    /// onto the undo stack, hands it to the sink, notifies observers, then
    /// replays any remote patches that arrived while the transaction was open.
    pub fn end_transaction(&mut self) -> Result<()> {
        let TransactionState::InTransaction { buffer, queued_remote } =
            std::mem::replace(&mut self.state, TransactionState::Idle)
        else {
            return Err(Error::MutationOutsideTransaction);
        };

        if !buffer.patch.is_empty() || !buffer.change.table_events.is_empty() {
            let patch_id = buffer.patch.patch_id;
            self.history.record_committed(HistoryEntry {
                patch_id,
                patch: buffer.patch.clone(),
                change: buffer.change.clone(),
            });
            if let Some(sink) = &self.sink {
                sink.broadcast(self.store_id, buffer.patch);
            }
            self.notify(&buffer.change);
        }

        for remote in queued_remote {
            self.route_remote_patch(remote.patch);
        }
        Ok(())
    }

    /// Aborts the open transaction: restores every touched field to its
    /// pre-transaction snapshot, deletes any record the transaction created,
    /// then replays queued remote patches.
    pub fn cancel_transaction(&mut self) -> Result<()> {
        let TransactionState::InTransaction { buffer, queued_remote } =
            std::mem::replace(&mut self.state, TransactionState::Idle)
        else {
            return Err(Error::MutationOutsideTransaction);
        };

        for ((schema_id, record_id, field), snapshot) in buffer.snapshots {
            if let Some(table) = self.tables.get_mut(&schema_id) {
                if let Some(record) = table.get_mut(&record_id) {
                    record.restore_field(&field, snapshot);
                }
            }
        }
        for (schema_id, record_id) in buffer.created_records {
            if let Some(table) = self.tables.get_mut(&schema_id) {
                table.remove(&record_id);
            }
        }

        for remote in queued_remote {
            self.route_remote_patch(remote.patch);
        }
        Ok(())
    }

    /// Applies a patch received from the adapter. Queued instead of applied
    /// immediately if a local transaction is open, so the transaction's own
    /// reads stay consistent with the snapshot it started from. Never
    /// returns an error to the caller: a malformed or stale fragment is
    /// logged and discarded, per spec.md §7.
    pub fn apply_remote_patch(&mut self, remote: RemotePatch) {
        if let TransactionState::InTransaction { queued_remote, .. } = &mut self.state {
            queued_remote.push(remote);
            return;
        }
        self.route_remote_patch(remote.patch);
    }

    /// Bootstraps this store from an adapter-delivered checkpoint plus the
    /// patches committed after it was taken (spec.md §4.5's patch-history
    /// bootstrap): replaces every table with the checkpoint's records, then
    /// replays each patch in order.
    pub fn bootstrap_from_history(&mut self, history: PatchHistory) -> Result<()> {
        for (schema_id, records) in history.checkpoint.content {
            let schema = self.schemas.get(&schema_id)?.clone();
            let mut table = Table::new(schema);
            for (record_id, fields) in records {
                table.put(Record::from_fields(record_id, schema_id.clone(), fields.into_iter().collect()));
            }
            self.tables.insert(schema_id, table);
        }
        for patch in history.patches {
            self.route_remote_patch(patch);
        }
        Ok(())
    }

    /// Serializes this store's tables into an opaque [`Checkpoint`], to hand
    /// to an adapter bootstrapping a new peer.
    pub fn checkpoint(&self) -> Checkpoint {
        let mut checkpoint = Checkpoint::new();
        for (schema_id, table) in &self.tables {
            for (record_id, record) in table.iter() {
                let fields = record
                    .field_names()
                    .map(|name| (name.clone(), record.field_state(name).expect("name came from this record").clone()))
                    .collect();
                checkpoint.put_record(schema_id, record_id, fields);
            }
        }
        checkpoint
    }

    /// Undoes the most recently committed local transaction (or the most
    /// recently undone redo), legal only when idle. Returns `false` if there
    /// is nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        if !matches!(self.state, TransactionState::Idle) {
            return Err(Error::NestedTransaction);
        }
        let Some(entry) = self.history.pop_undo() else {
            return Ok(false);
        };
        let redo_entry = self.commit_inverse(&entry);
        self.history.push_redo(redo_entry);
        Ok(true)
    }

    /// Re-applies the most recently undone transaction. Returns `false` if
    /// there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool> {
        if !matches!(self.state, TransactionState::Idle) {
            return Err(Error::NestedTransaction);
        }
        let Some(entry) = self.history.pop_redo() else {
            return Ok(false);
        };
        let undo_entry = self.commit_inverse(&entry);
        self.history.push_undo(undo_entry);
        Ok(true)
    }

    fn route_remote_patch(&mut self, patch: Patch) {
        let mut notification = ChangeNotification::new();
        for (schema_id, records) in &patch.content {
            let Some(table) = self.tables.get_mut(schema_id) else {
                tracing::warn!(schema_id, "discarding patch fragment for unknown schema");
                continue;
            };
            for (record_id, fields) in records {
                let record = table.get_or_create_mut(record_id);
                for (field_name, fragment) in fields {
                    match record.apply_field_patch(field_name, fragment) {
                        Ok(Some(change)) => notification.stage(schema_id, record_id, field_name, change),
                        Ok(None) => {}
                        Err(error) => {
                            tracing::warn!(%error, schema_id, record_id, field_name, "discarding malformed field patch");
                        }
                    }
                }
            }
        }
        for (schema_id, record_ids) in &patch.removed_records {
            let Some(table) = self.tables.get_mut(schema_id) else {
                tracing::warn!(schema_id, "discarding record removal for unknown schema");
                continue;
            };
            for record_id in record_ids {
                if table.remove(record_id).is_some() {
                    notification.table_events.push(TableEvent::RecordRemoved {
                        schema_id: schema_id.clone(),
                        record_id: record_id.clone(),
                    });
                }
            }
        }
        self.factory.observe(patch.patch_id.clock());
        if !notification.is_empty() {
            self.notify(&notification);
        }
    }

    /// Recomputes the inverse of `entry`'s patch, applies it to live state,
    /// broadcasts and notifies, and returns the entry to push onto the
    /// opposite history stack — the shared core of `undo` and `redo`.
    fn commit_inverse(&mut self, entry: &HistoryEntry) -> HistoryEntry {
        let inverse = history::build_inverse(entry, &mut self.factory);
        let patch_id = self.factory.next();
        let mut patch = Patch::new(patch_id, self.store_id);
        let mut notification = ChangeNotification::new();

        for (schema_id, records) in &inverse.content {
            let Some(table) = self.tables.get_mut(schema_id) else { continue };
            for (record_id, fields) in records {
                let record = table.get_or_create_mut(record_id);
                for (field_name, fragment) in fields {
                    if let Ok(Some(change)) = record.apply_field_patch(field_name, fragment) {
                        notification.stage(schema_id, record_id, field_name, change);
                    }
                    patch.stage(schema_id, record_id, field_name, fragment.clone());
                }
            }
        }

        for (schema_id, record_id) in &inverse.recreations {
            notification.table_events.push(TableEvent::RecordAdded {
                schema_id: schema_id.clone(),
                record_id: record_id.clone(),
            });
        }

        for (schema_id, record_id) in &inverse.removals {
            if let Some(table) = self.tables.get_mut(schema_id) {
                table.remove(record_id);
            }
            patch.stage_removal(schema_id, record_id);
            notification.table_events.push(TableEvent::RecordRemoved {
                schema_id: schema_id.clone(),
                record_id: record_id.clone(),
            });
        }

        if let Some(sink) = &self.sink {
            sink.broadcast(self.store_id, patch.clone());
        }
        self.notify(&notification);
        HistoryEntry { patch_id, patch, change: notification }
    }

    fn notify(&self, notification: &ChangeNotification) {
        if notification.is_empty() {
            return;
        }
        for observer in self.observers.values() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| observer(notification)));
            if result.is_err() {
                tracing::error!("change observer panicked; continuing with remaining observers");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;
    use crate::schema::{FieldDef, RecordSchema};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn users_schema() -> RecordSchema {
        RecordSchema::new(
            "users",
            vec![
                FieldDef::new("id", FieldKind::PrimaryKey),
                FieldDef::new("name", FieldKind::Value),
                FieldDef::new("tags", FieldKind::List),
            ],
        )
    }

    fn store() -> Store {
        let mut schemas = SchemaRegistry::new();
        schemas.register(users_schema());
        Store::new(1, schemas).unwrap()
    }

    #[test]
    fn mutation_outside_transaction_is_rejected() {
        let mut s = store();
        assert!(matches!(
            s.update_field("users", "u1", "name", FieldUpdate::Value(json!("x"))),
            Err(Error::MutationOutsideTransaction)
        ));
    }

    #[test]
    fn nested_transaction_is_rejected() {
        let mut s = store();
        s.begin_transaction().unwrap();
        assert!(matches!(s.begin_transaction(), Err(Error::NestedTransaction)));
    }

    #[test]
    fn create_and_update_commit_and_are_readable() {
        let mut s = store();
        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();
        s.end_transaction().unwrap();

        assert_eq!(s.get("users", "u1", "name").unwrap(), json!("Alice"));
        assert!(s.can_undo());
    }

    #[test]
    fn cancel_transaction_restores_pre_transaction_state() {
        let mut s = store();
        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();
        s.end_transaction().unwrap();

        s.begin_transaction().unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Bob"))).unwrap();
        s.cancel_transaction().unwrap();

        assert_eq!(s.get("users", "u1", "name").unwrap(), json!("Alice"));
        assert!(!s.can_redo());
    }

    #[test]
    fn cancel_transaction_removes_records_created_within_it() {
        let mut s = store();
        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.cancel_transaction().unwrap();

        assert!(matches!(s.get("users", "u1", "name"), Err(Error::RecordNotFound(_))));
    }

    #[test]
    fn undo_then_redo_round_trips_a_value_write() {
        let mut s = store();
        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();
        s.end_transaction().unwrap();

        assert!(s.undo().unwrap());
        assert_eq!(s.get("users", "u1", "name").unwrap(), Json::Null);

        assert!(s.redo().unwrap());
        assert_eq!(s.get("users", "u1", "name").unwrap(), json!("Alice"));
    }

    #[test]
    fn undo_with_empty_stack_reports_false() {
        let mut s = store();
        assert!(!s.undo().unwrap());
    }

    /// Spec §8 scenario 4: undoing the transaction that created a record
    /// removes the record entirely, even after a concurrent remote patch has
    /// advanced one of its fields further in the meantime.
    #[test]
    fn undo_after_remote_edit_removes_the_created_record() {
        let mut s = store();
        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();
        s.end_transaction().unwrap();

        // A remote replica (store 2) independently overwrites the same field
        // with a later OpId.
        let remote_op = OpId::new(100, 2).unwrap();
        let mut remote_patch = Patch::new(remote_op, 2);
        remote_patch.stage(
            "users",
            "u1",
            "name",
            crate::field::FieldPatch::Value(crate::field::ValuePatch { op_id: remote_op, value: json!("Carol") }),
        );
        s.apply_remote_patch(RemotePatch { adapter_patch_id: "r1".into(), patch: remote_patch });
        assert_eq!(s.get("users", "u1", "name").unwrap(), json!("Carol"));

        assert!(s.undo().unwrap());
        // The record the undone transaction created is gone outright, not
        // merely reset to null — Carol's overwritten register is
        // garbage-collected with it.
        assert!(matches!(s.get("users", "u1", "name"), Err(Error::RecordNotFound(_))));
    }

    /// The removal from undoing a creating transaction propagates to other
    /// replicas via the normal patch sink, exactly like a field fragment
    /// would (spec.md §8 scenario 4: "when broadcast, B also removes R").
    #[test]
    fn undo_of_a_creating_transaction_broadcasts_a_record_removal() {
        struct CapturingSink {
            last: std::sync::Mutex<Option<Patch>>,
        }
        impl PatchSink for CapturingSink {
            fn broadcast(&self, _store_id: u32, patch: Patch) {
                *self.last.lock().unwrap() = Some(patch);
            }
        }

        let sink = Arc::new(CapturingSink { last: std::sync::Mutex::new(None) });
        let mut schemas = SchemaRegistry::new();
        schemas.register(users_schema());
        let mut a = Store::new(1, schemas.clone()).unwrap().with_sink(sink.clone());

        a.begin_transaction().unwrap();
        a.create_record("users", Some("u1".into())).unwrap();
        a.update_field("users", "u1", "name", FieldUpdate::Value(json!("v0"))).unwrap();
        a.end_transaction().unwrap();

        assert!(a.undo().unwrap());
        let removal_patch = sink.last.lock().unwrap().clone().expect("undo broadcasts a patch");
        assert_eq!(removal_patch.removed_records.get("users").unwrap().contains("u1"), true);

        let mut b = Store::new(2, schemas).unwrap();
        b.apply_remote_patch(RemotePatch { adapter_patch_id: "r1".into(), patch: removal_patch });
        assert!(matches!(b.get("users", "u1", "name"), Err(Error::RecordNotFound(_))));
    }

    #[test]
    fn remote_patch_during_open_transaction_is_queued_until_it_resolves() {
        let mut s = store();
        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();

        let remote_op = OpId::new(5, 2).unwrap();
        let mut remote_patch = Patch::new(remote_op, 2);
        remote_patch.stage(
            "users",
            "u1",
            "name",
            crate::field::FieldPatch::Value(crate::field::ValuePatch { op_id: remote_op, value: json!("Queued") }),
        );
        s.apply_remote_patch(RemotePatch { adapter_patch_id: "r1".into(), patch: remote_patch });

        // Still reflects the transaction's own write, not the queued remote one.
        assert_eq!(s.get("users", "u1", "name").unwrap(), json!("Alice"));

        s.end_transaction().unwrap();
        // Remote patch carries a later OpId, so it wins once replayed.
        assert_eq!(s.get("users", "u1", "name").unwrap(), json!("Queued"));
    }

    /// Spec §8 scenario 5: every field write inside one transaction
    /// broadcasts as a single atomic patch.
    #[test]
    fn transaction_commits_as_a_single_atomic_patch() {
        struct CountingSink {
            calls: AtomicUsize,
            fields_in_last: std::sync::Mutex<usize>,
        }
        impl PatchSink for CountingSink {
            fn broadcast(&self, _store_id: u32, patch: Patch) {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let count: usize = patch.content.values().map(|r| r.values().map(|f| f.len()).sum::<usize>()).sum();
                *self.fields_in_last.lock().unwrap() = count;
            }
        }

        let sink = Arc::new(CountingSink { calls: AtomicUsize::new(0), fields_in_last: std::sync::Mutex::new(0) });
        let mut schemas = SchemaRegistry::new();
        schemas.register(users_schema());
        let mut s = Store::new(1, schemas).unwrap().with_sink(sink.clone());

        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();
        s.update_field("users", "u1", "tags", FieldUpdate::List(crate::field::ListUpdate::Push(json!("admin")))).unwrap();
        s.end_transaction().unwrap();

        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*sink.fields_in_last.lock().unwrap(), 2);
    }

    #[test]
    fn subscribed_observer_receives_committed_changes() {
        let mut s = store();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        s.subscribe(Box::new(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();
        s.end_transaction().unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_observer_does_not_prevent_others_from_running() {
        let mut s = store();
        s.subscribe(Box::new(|_| panic!("boom")));
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        s.subscribe(Box::new(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));

        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();
        s.end_transaction().unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn checkpoint_then_bootstrap_reproduces_the_same_readable_state() {
        let mut s = store();
        s.begin_transaction().unwrap();
        s.create_record("users", Some("u1".into())).unwrap();
        s.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();
        s.end_transaction().unwrap();

        let checkpoint = s.checkpoint();

        let mut schemas = SchemaRegistry::new();
        schemas.register(users_schema());
        let mut replica = Store::new(2, schemas).unwrap();
        replica.bootstrap_from_history(PatchHistory { checkpoint, patches: Vec::new() }).unwrap();

        assert_eq!(replica.get("users", "u1", "name").unwrap(), json!("Alice"));
    }
}
