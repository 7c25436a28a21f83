//! Tests for the sync protocol's data shapes and wire validation.
//!
//! These don't require a running PostgreSQL database — they exercise the
//! serialization contracts the HTTP and WebSocket handlers build on top of.
//! Handler-level integration tests (with a real pool) would additionally
//! need `DATABASE_URL` set, which the rest of this file deliberately avoids
//! depending on.

use convergent_store::adapter::{validate_wire_message, PatchHistory};
use convergent_store::{Checkpoint, FieldKind, FieldUpdate, OpId, Patch, RecordSchema, RemotePatch, SchemaRegistry, Store};
use convergent_store::schema::FieldDef;
use serde_json::json;

fn sample_patch(clock: u64, store_id: u32) -> Patch {
    let mut patch = Patch::new(OpId::new(clock, store_id).unwrap(), store_id);
    patch.stage(
        "notes",
        "n1",
        "title",
        convergent_store::field::FieldPatch::Value(convergent_store::field::ValuePatch {
            op_id: OpId::new(clock, store_id).unwrap(),
            value: json!("hello"),
        }),
    );
    patch
}

#[test]
fn patch_history_round_trips_through_json() {
    let checkpoint = Checkpoint::new();
    let history = PatchHistory { checkpoint, patches: vec![] };

    let json = serde_json::to_string(&history).unwrap();
    let parsed: PatchHistory = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.patches.len(), 0);
    assert_eq!(parsed.checkpoint.record_count(), 0);
}

#[test]
fn bootstrap_history_carries_a_real_checkpoint_from_a_store() {
    let mut schemas = SchemaRegistry::new();
    schemas.register(RecordSchema::new(
        "notes",
        vec![FieldDef::new("id", FieldKind::PrimaryKey), FieldDef::new("title", FieldKind::Value)],
    ));
    let mut store = Store::new(1, schemas).unwrap();
    store.begin_transaction().unwrap();
    store.create_record("notes", Some("n1".into())).unwrap();
    store.update_field("notes", "n1", "title", FieldUpdate::Value(json!("hello"))).unwrap();
    store.end_transaction().unwrap();

    let history = PatchHistory { checkpoint: store.checkpoint(), patches: vec![] };
    let json = serde_json::to_value(&history).unwrap();
    assert!(json["checkpoint"]["content"]["notes"]["n1"].is_object());
}

#[test]
fn remote_patch_preserves_the_adapter_assigned_id_across_json() {
    let remote = RemotePatch { adapter_patch_id: "server-assigned-1".to_string(), patch: sample_patch(1, 7) };
    let json = serde_json::to_string(&remote).unwrap();
    let parsed: RemotePatch = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.adapter_patch_id, "server-assigned-1");
    assert_eq!(parsed.patch.patch_id, remote.patch.patch_id);
}

#[test]
fn malformed_wire_frame_is_reported_not_panicked() {
    let raw = json!({"totally": "not a wire message"});
    assert!(validate_wire_message(&raw).is_err());
}
