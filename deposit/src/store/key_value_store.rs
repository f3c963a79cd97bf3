use crate::errors::DepositResult;
use std::ops::Deref;
use std::sync::Arc;

/// A sorted, string-keyed entry store backing the flat adapter.
///
/// Implementations only need ordered prefix scans and single-key operations; the flat
/// adapter builds its whole layout on top of these. None of the methods are expected to
/// be atomic across keys.
///
/// # Implementations
/// - [`crate::store::flat::InMemoryKeyValueStore`]: concurrent skip list, not persisted
/// - `FjallKeyValueStore` (in `deposit-fjall-adapter`): persistent LSM-tree storage
pub trait KeyValueStoreProvider: Send + Sync {
    /// Returns the raw entry stored under `key`.
    fn get_item(&self, key: &str) -> DepositResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous entry.
    fn set_item(&self, key: &str, value: &str) -> DepositResult<()>;

    /// Removes the entry under `key`. Removing an absent key is not an error.
    fn remove_item(&self, key: &str) -> DepositResult<()>;

    /// Returns every entry whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &str) -> DepositResult<Vec<(String, String)>>;

    /// Makes previous writes durable. A no-op for volatile stores.
    fn flush(&self) -> DepositResult<()> {
        Ok(())
    }
}

/// Cheaply cloneable handle to a [`KeyValueStoreProvider`].
///
/// Clones share the same underlying store, which is how tests reach the raw entries a
/// flat adapter has written.
#[derive(Clone)]
pub struct KeyValueStore {
    inner: Arc<dyn KeyValueStoreProvider>,
}

impl KeyValueStore {
    pub fn new<T: KeyValueStoreProvider + 'static>(inner: T) -> Self {
        KeyValueStore {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for KeyValueStore {
    type Target = Arc<dyn KeyValueStoreProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
