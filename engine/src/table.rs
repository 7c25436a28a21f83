//! Table (C4, part 2): a schema-bound, deterministically ordered collection
//! of records.

use crate::error::{Error, Result};
use crate::record::Record;
use crate::schema::RecordSchema;
use crate::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A mapping `recordId -> Record`, ordered by `recordId` for deterministic
/// iteration (a `BTreeMap`, matching the teacher's choice of `BTreeMap` for
/// snapshot determinism, generalized here to the table's live storage too).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: RecordSchema,
    records: BTreeMap<RecordId, Record>,
}

impl Table {
    pub fn new(schema: RecordSchema) -> Self {
        Self { schema, records: BTreeMap::new() }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Creates a new record at `record_id`, failing with [`Error::DuplicateRecord`]
    /// if it already exists.
    pub fn create(&mut self, record_id: RecordId) -> Result<&mut Record> {
        if self.records.contains_key(&record_id) {
            return Err(Error::DuplicateRecord(record_id));
        }
        let record = Record::new(&self.schema, record_id.clone());
        self.records.insert(record_id.clone(), record);
        Ok(self.records.get_mut(&record_id).expect("just inserted"))
    }

    /// Inserts or overwrites a record outright (used for checkpoint restore
    /// and remote patch application, where `DuplicateRecord` is not a valid
    /// failure — remote creation is idempotent).
    pub fn put(&mut self, record: Record) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn get(&self, record_id: &str) -> Option<&Record> {
        self.records.get(record_id)
    }

    pub fn get_mut(&mut self, record_id: &str) -> Option<&mut Record> {
        self.records.get_mut(record_id)
    }

    pub fn get_or_create_mut(&mut self, record_id: &str) -> &mut Record {
        if !self.records.contains_key(record_id) {
            let record = Record::new(&self.schema, record_id.to_string());
            self.records.insert(record_id.to_string(), record);
        }
        self.records.get_mut(record_id).expect("just ensured present")
    }

    pub fn remove(&mut self, record_id: &str) -> Option<Record> {
        self.records.remove(record_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordId, &Record)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder { table: self }
    }
}

/// Read-only query ergonomics over a table's current records, kept from the
/// teacher's `QueryBuilder` shape.
pub struct QueryBuilder<'a> {
    table: &'a Table,
}

impl<'a> QueryBuilder<'a> {
    pub fn all(&self) -> Vec<&'a Record> {
        self.table.records.values().collect()
    }

    pub fn first(&self) -> Option<&'a Record> {
        self.table.records.values().next()
    }

    pub fn count(&self) -> usize {
        self.table.records.len()
    }

    pub fn filter(&self, predicate: impl Fn(&Record) -> bool) -> Vec<&'a Record> {
        self.table.records.values().filter(|r| predicate(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;
    use crate::schema::FieldDef;

    fn schema() -> RecordSchema {
        RecordSchema::new("users", vec![FieldDef::new("id", FieldKind::PrimaryKey)])
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let mut t = Table::new(schema());
        t.create("r1".into()).unwrap();
        assert!(matches!(t.create("r1".into()), Err(Error::DuplicateRecord(_))));
    }

    #[test]
    fn iteration_is_ordered_by_record_id() {
        let mut t = Table::new(schema());
        t.create("b".into()).unwrap();
        t.create("a".into()).unwrap();
        t.create("c".into()).unwrap();
        let ids: Vec<_> = t.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn query_builder_counts_and_filters() {
        let mut t = Table::new(schema());
        t.create("a".into()).unwrap();
        t.create("b".into()).unwrap();
        assert_eq!(t.query().count(), 2);
        assert_eq!(t.query().filter(|r| r.id == "a").len(), 1);
    }
}
