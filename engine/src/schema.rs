//! Schema: an immutable description of a schema id plus an ordered mapping
//! from field name to field kind.

use crate::error::{Error, Result};
use crate::field::FieldKind;
use crate::{FieldName, SchemaId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One field's name and kind within a [`RecordSchema`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    pub name: FieldName,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(name: impl Into<FieldName>, kind: FieldKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// An ordered mapping from field name to field kind, identified by a schema id.
///
/// Exactly one field must be `FieldKind::PrimaryKey`; it is not a runtime
/// mutation target and always holds the record's own id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSchema {
    pub schema_id: SchemaId,
    pub fields: Vec<FieldDef>,
}

impl RecordSchema {
    pub fn new(schema_id: impl Into<SchemaId>, fields: Vec<FieldDef>) -> Self {
        Self { schema_id: schema_id.into(), fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key_field(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.kind == FieldKind::PrimaryKey)
    }

    pub fn validate_field(&self, name: &str) -> Result<&FieldDef> {
        self.field(name).ok_or_else(|| Error::FieldUnknown {
            schema: self.schema_id.clone(),
            field: name.to_string(),
        })
    }
}

/// A registry of known schemas, keyed by schema id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaRegistry {
    schemas: HashMap<SchemaId, RecordSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: RecordSchema) {
        self.schemas.insert(schema.schema_id.clone(), schema);
    }

    pub fn get(&self, schema_id: &str) -> Result<&RecordSchema> {
        self.schemas
            .get(schema_id)
            .ok_or_else(|| Error::SchemaUnknown(schema_id.to_string()))
    }

    pub fn contains(&self, schema_id: &str) -> bool {
        self.schemas.contains_key(schema_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordSchema> {
        self.schemas.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn looks_up_fields_by_name() {
        let schema = users_schema();
        assert_eq!(schema.field("name").unwrap().kind, FieldKind::Value);
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn registry_rejects_unknown_schema() {
        let registry = SchemaRegistry::new();
        assert!(matches!(registry.get("users"), Err(Error::SchemaUnknown(_))));
    }

    #[test]
    fn registry_finds_registered_schema() {
        let mut registry = SchemaRegistry::new();
        registry.register(users_schema());
        assert!(registry.contains("users"));
        assert_eq!(registry.get("users").unwrap().schema_id, "users");
    }
}
