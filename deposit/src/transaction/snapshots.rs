use crate::common::{field_value, RecordKey};
use crate::errors::{DepositError, DepositResult, ErrorKind};
use indexmap::IndexMap;
use serde_json::Value;

/// In-memory copy of one table inside a transaction.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    key_field: String,
    records: Vec<Value>,
}

impl TableSnapshot {
    pub fn new(key_field: &str, records: Vec<Value>) -> Self {
        TableSnapshot {
            key_field: key_field.to_string(),
            records,
        }
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<Value> {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<Value> {
        self.records
    }

    fn position(&self, key: &RecordKey) -> Option<usize> {
        self.records.iter().position(|record| {
            field_value(record, &self.key_field)
                .and_then(|value| RecordKey::from_value(value).ok())
                .as_ref()
                == Some(key)
        })
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Value> {
        self.position(key).map(|index| &self.records[index])
    }

    pub fn get_mut(&mut self, key: &RecordKey) -> Option<&mut Value> {
        self.position(key).map(move |index| &mut self.records[index])
    }

    /// Inserts `record`, replacing the record with the same key in place.
    pub fn put(&mut self, record: Value) -> DepositResult<()> {
        let key = match field_value(&record, &self.key_field) {
            Some(Value::Null) | None => {
                return Err(DepositError::new(
                    &format!("Record is missing its primary key field {}", self.key_field),
                    ErrorKind::MissingPrimaryKey,
                ))
            }
            Some(value) => RecordKey::from_value(value)?,
        };

        match self.position(&key) {
            Some(index) => self.records[index] = record,
            None => self.records.push(record),
        }
        Ok(())
    }

    /// Removes the record with `key`, returning it.
    pub fn delete(&mut self, key: &RecordKey) -> Option<Value> {
        self.position(key).map(|index| self.records.remove(index))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The tables a transaction body works on, by name.
///
/// Only the tables named when the transaction started are available; asking for any
/// other table fails with [`ErrorKind::InvalidOperation`].
#[derive(Debug, Clone, Default)]
pub struct TableSnapshots {
    tables: IndexMap<String, TableSnapshot>,
}

impl TableSnapshots {
    pub fn new() -> Self {
        TableSnapshots::default()
    }

    pub(crate) fn insert(&mut self, table: &str, snapshot: TableSnapshot) {
        self.tables.insert(table.to_string(), snapshot);
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(|name| name.as_str()).collect()
    }

    pub fn table(&self, table: &str) -> DepositResult<&TableSnapshot> {
        self.tables.get(table).ok_or_else(|| out_of_scope(table))
    }

    pub fn table_mut(&mut self, table: &str) -> DepositResult<&mut TableSnapshot> {
        self.tables.get_mut(table).ok_or_else(|| out_of_scope(table))
    }

    /// Shorthand for `table(table)?.get(key)`.
    pub fn find<K: Into<RecordKey>>(&self, table: &str, key: K) -> DepositResult<Option<&Value>> {
        Ok(self.table(table)?.get(&key.into()))
    }

    /// Shorthand for `table_mut(table)?.put(record)`.
    pub fn upsert(&mut self, table: &str, record: Value) -> DepositResult<()> {
        self.table_mut(table)?.put(record)
    }

    /// Shorthand for `table_mut(table)?.delete(key)`.
    pub fn remove<K: Into<RecordKey>>(&mut self, table: &str, key: K) -> DepositResult<Option<Value>> {
        Ok(self.table_mut(table)?.delete(&key.into()))
    }

    pub(crate) fn into_tables(self) -> IndexMap<String, TableSnapshot> {
        self.tables
    }
}

fn out_of_scope(table: &str) -> DepositError {
    DepositError::new(
        &format!("Table {} is not part of this transaction", table),
        ErrorKind::InvalidOperation,
    )
}
