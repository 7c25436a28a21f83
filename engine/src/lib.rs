//! # Convergent Store
//!
//! A conflict-free replicated datastore core for local-first applications.
//!
//! This crate provides the merge logic for offline-first, multi-replica data
//! without a central authority: totally ordered operation ids, per-field CRDT
//! kernels, transactional batching, undo/redo, and the boundary contract a
//! transport-specific server adapter implements around it.
//!
//! ## Design principles
//!
//! - **No IO**: the store has no knowledge of files, network, or platform.
//!   The one boundary where I/O happens — [`adapter::ServerAdapter`] — is a
//!   trait the caller implements and drives; the store never awaits.
//! - **Deterministic**: replicas that have seen the same set of patches,
//!   applied in any order, converge to the same state.
//! - **Testable**: pure logic, no mocks needed for the kernels or the
//!   transaction state machine.
//!
//! ## Core concepts
//!
//! - [`opid::OpId`] — a totally ordered `(clock, storeId)` pair identifying
//!   every operation issued anywhere in the system.
//! - [`position::FractionalPosition`] — a dense, densely-orderable key used
//!   to place list/text elements without ever renumbering neighbors.
//! - [`field`] — the closed set of mergeable field kernels: `Value`, `Map`,
//!   `List`, `Text`, `PrimaryKey`.
//! - [`record::Record`] / [`table::Table`] — a schema-bound collection of
//!   identified rows, each holding one `FieldState` per declared field.
//! - [`store::Store`] — the transactional state machine tying the above
//!   together: `beginTransaction`/`endTransaction`/`cancelTransaction`,
//!   remote patch routing, undo/redo, and observer notification.
//! - [`history::History`] — bounded undo/redo stacks with inverse patches
//!   recomputed against the metadata in effect at undo time.
//! - [`adapter::ServerAdapter`] — the transport-agnostic contract a
//!   networked peer implements; the concrete, HTTP/WebSocket-backed
//!   implementation lives in the `convergent-store-server` crate.
//! - [`snapshot::Checkpoint`] — an opaque, versioned snapshot of an entire
//!   store's tables, used to bootstrap a newly-registered peer.
//!
//! ## Quick start
//!
//! ```rust
//! use convergent_store::field::{FieldKind, FieldUpdate};
//! use convergent_store::schema::{FieldDef, RecordSchema, SchemaRegistry};
//! use convergent_store::store::Store;
//! use serde_json::json;
//!
//! let mut schemas = SchemaRegistry::new();
//! schemas.register(RecordSchema::new(
//!     "users",
//!     vec![
//!         FieldDef::new("id", FieldKind::PrimaryKey),
//!         FieldDef::new("name", FieldKind::Value),
//!     ],
//! ));
//!
//! let mut store = Store::new(1, schemas).unwrap();
//! store.begin_transaction().unwrap();
//! store.create_record("users", Some("u1".into())).unwrap();
//! store.update_field("users", "u1", "name", FieldUpdate::Value(json!("Alice"))).unwrap();
//! store.end_transaction().unwrap();
//!
//! assert_eq!(store.get("users", "u1", "name").unwrap(), json!("Alice"));
//! ```

pub mod adapter;
pub mod change;
pub mod error;
pub mod field;
pub mod history;
pub mod opid;
pub mod patch;
pub mod position;
pub mod record;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod table;

pub use adapter::{AdapterEvent, PatchHistory, PatchSink, ServerAdapter, Timeout};
pub use change::{ChangeNotification, SubscriptionId, TableEvent};
pub use error::Error;
pub use field::{FieldKind, FieldState, FieldUpdate};
pub use history::History;
pub use opid::OpId;
pub use patch::{Patch, RemotePatch};
pub use position::FractionalPosition;
pub use record::Record;
pub use schema::{FieldDef, RecordSchema, SchemaRegistry};
pub use snapshot::Checkpoint;
pub use store::Store;
pub use table::Table;

/// A record's id within its table, unique per `(schemaId, recordId)` pair.
pub type RecordId = String;
/// A schema's id within a store's registry.
pub type SchemaId = String;
/// A field's name within a schema.
pub type FieldName = String;
/// The non-zero id identifying a single replica/store.
pub type StoreId = u32;
