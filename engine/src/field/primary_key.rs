//! The `PrimaryKey` kernel: a read-only field holding the record's own id.

use serde::{Deserialize, Serialize};

/// No metadata: the value is fixed at record creation and never merges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryKeyField {
    pub id: String,
}

impl PrimaryKeyField {
    pub fn new(record_id: &str) -> Self {
        Self { id: record_id.to_string() }
    }
}
