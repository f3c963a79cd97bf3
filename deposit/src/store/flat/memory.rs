use crate::errors::DepositResult;
use crate::store::KeyValueStoreProvider;
use crossbeam_skiplist::SkipMap;
use std::ops::Bound::{Included, Unbounded};
use std::sync::Arc;

/// Volatile key-value store on a concurrent skip list.
///
/// Entries are kept in key order, so prefix scans are a range walk that stops at the
/// first key without the prefix. Clones share the same entries.
#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<SkipMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        InMemoryKeyValueStore {
            entries: Arc::new(SkipMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys currently stored, in order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl KeyValueStoreProvider for InMemoryKeyValueStore {
    fn get_item(&self, key: &str) -> DepositResult<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> DepositResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> DepositResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> DepositResult<Vec<(String, String)>> {
        let entries = self
            .entries
            .range::<str, _>((Included(prefix), Unbounded))
            .take_while(|entry| entry.key().starts_with(prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        Ok(entries)
    }
}
