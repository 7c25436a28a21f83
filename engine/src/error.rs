//! Error types for the datastore core.

use crate::{FieldName, RecordId, SchemaId};
use thiserror::Error;

/// All possible errors from the store core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A field was mutated outside an open transaction.
    #[error("mutation attempted outside an open transaction")]
    MutationOutsideTransaction,

    /// `beginTransaction` was called while a transaction was already open.
    #[error("a transaction is already open on this store")]
    NestedTransaction,

    /// `Table::create` was called with an id that already exists.
    #[error("record already exists: {0}")]
    DuplicateRecord(RecordId),

    /// A patch or operation referenced a schema the store doesn't know.
    #[error("unknown schema: {0}")]
    SchemaUnknown(SchemaId),

    /// A patch or operation referenced a record the table doesn't know.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// A patch or operation referenced a field the schema doesn't define.
    #[error("unknown field '{field}' in schema {schema}")]
    FieldUnknown { schema: SchemaId, field: FieldName },

    /// `FractionalPosition::between` was called with `low >= high`.
    #[error("position order violated: low must compare strictly less than high")]
    PositionOrder,

    /// A received patch failed structural or semantic validation.
    ///
    /// The store discards the patch and logs it; this is never fatal.
    #[error("malformed patch: {0}")]
    MalformedPatch(String),

    /// An [`OpId`](crate::opid::OpId) could not be decoded from its wire form.
    #[error("malformed op id: {0}")]
    MalformedOpId(String),

    /// The adapter could not complete a request after exhausting its retry budget.
    #[error("adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// A caller-supplied timeout elapsed before the adapter responded.
    #[error("adapter request timed out")]
    AdapterTimeout,

    /// `fetchPatches` was asked for an id the adapter does not have.
    #[error("patch not found: {0}")]
    PatchNotFound(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::DuplicateRecord("r1".into());
        assert_eq!(err.to_string(), "record already exists: r1");

        let err = Error::FieldUnknown {
            schema: "users".into(),
            field: "age".into(),
        };
        assert_eq!(err.to_string(), "unknown field 'age' in schema users");

        assert_eq!(
            Error::MutationOutsideTransaction.to_string(),
            "mutation attempted outside an open transaction"
        );
    }
}
