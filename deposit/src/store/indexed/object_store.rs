use crate::common::{field_value, RecordKey};
use crate::errors::{DepositError, DepositResult, ErrorKind};
use im::{OrdMap, OrdSet};
use serde_json::Value;
use std::collections::BTreeMap;

/// Secondary index: index key to the primary keys of the records carrying it.
///
/// Records whose indexed field is missing or not a valid key are simply not indexed.
#[derive(Debug, Clone)]
pub(crate) struct IndexData {
    key_path: String,
    entries: OrdMap<RecordKey, OrdSet<RecordKey>>,
}

impl IndexData {
    fn new(key_path: &str) -> Self {
        IndexData {
            key_path: key_path.to_string(),
            entries: OrdMap::new(),
        }
    }

    fn index_key(&self, record: &Value) -> Option<RecordKey> {
        field_value(record, &self.key_path).and_then(|value| RecordKey::from_value(value).ok())
    }

    fn insert(&mut self, record: &Value, primary: &RecordKey) {
        if let Some(index_key) = self.index_key(record) {
            self.entries
                .entry(index_key)
                .or_insert_with(OrdSet::new)
                .insert(primary.clone());
        }
    }

    fn remove(&mut self, record: &Value, primary: &RecordKey) {
        if let Some(index_key) = self.index_key(record) {
            let now_empty = match self.entries.get_mut(&index_key) {
                Some(primaries) => {
                    primaries.remove(primary);
                    primaries.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.entries.remove(&index_key);
            }
        }
    }

    fn lookup(&self, index_key: &RecordKey) -> Vec<RecordKey> {
        self.entries
            .get(index_key)
            .map(|primaries| primaries.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// One table of an indexed database: records keyed by their inline primary key.
///
/// Records and index entries live in persistent maps, so a whole store can be
/// snapshotted by cloning it.
#[derive(Debug, Clone)]
pub(crate) struct ObjectStore {
    key_path: String,
    records: OrdMap<RecordKey, Value>,
    indexes: BTreeMap<String, IndexData>,
}

impl ObjectStore {
    pub(crate) fn new(key_path: &str) -> Self {
        ObjectStore {
            key_path: key_path.to_string(),
            records: OrdMap::new(),
            indexes: BTreeMap::new(),
        }
    }

    pub(crate) fn key_path(&self) -> &str {
        &self.key_path
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn get(&self, key: &RecordKey) -> Option<&Value> {
        self.records.get(key)
    }

    pub(crate) fn entries(&self) -> Vec<(RecordKey, Value)> {
        self.records
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub(crate) fn put(&mut self, value: Value) -> DepositResult<RecordKey> {
        let key = match field_value(&value, &self.key_path) {
            Some(Value::Null) | None => {
                return Err(DepositError::new(
                    &format!("Value has no key at path {}", self.key_path),
                    ErrorKind::MissingPrimaryKey,
                ))
            }
            Some(key_value) => RecordKey::from_value(key_value)?,
        };

        if let Some(previous) = self.records.get(&key).cloned() {
            for index in self.indexes.values_mut() {
                index.remove(&previous, &key);
            }
        }
        for index in self.indexes.values_mut() {
            index.insert(&value, &key);
        }
        self.records.insert(key.clone(), value);
        Ok(key)
    }

    pub(crate) fn delete(&mut self, key: &RecordKey) -> Option<Value> {
        let removed = self.records.remove(key);
        if let Some(previous) = &removed {
            for index in self.indexes.values_mut() {
                index.remove(previous, key);
            }
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.entries.clear();
        }
    }

    pub(crate) fn index_names(&self) -> Vec<String> {
        self.indexes.keys().cloned().collect()
    }

    pub(crate) fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    /// Creates an index and fills it from the records already stored.
    pub(crate) fn create_index(&mut self, name: &str, key_path: &str) -> DepositResult<()> {
        if name.trim().is_empty() || key_path.trim().is_empty() {
            return Err(DepositError::new(
                "Index name and key path must not be empty",
                ErrorKind::IndexingError,
            ));
        }
        if self.indexes.contains_key(name) {
            return Err(DepositError::new(
                &format!("Index {} already exists", name),
                ErrorKind::IndexingError,
            ));
        }

        let mut index = IndexData::new(key_path);
        for (key, record) in self.records.iter() {
            index.insert(record, key);
        }
        self.indexes.insert(name.to_string(), index);
        Ok(())
    }

    pub(crate) fn delete_index(&mut self, name: &str) -> bool {
        self.indexes.remove(name).is_some()
    }

    pub(crate) fn get_by_index(
        &self,
        name: &str,
        index_key: &RecordKey,
    ) -> DepositResult<Vec<(RecordKey, Value)>> {
        let index = self.indexes.get(name).ok_or_else(|| {
            DepositError::new(
                &format!("Index {} does not exist", name),
                ErrorKind::IndexingError,
            )
        })?;

        Ok(index
            .lookup(index_key)
            .into_iter()
            .filter_map(|key| self.records.get(&key).map(|value| (key, value.clone())))
            .collect())
    }
}

/// Committed content of one database.
#[derive(Debug, Clone, Default)]
pub(crate) struct DatabaseState {
    pub(crate) version: u32,
    pub(crate) stores: OrdMap<String, ObjectStore>,
}
