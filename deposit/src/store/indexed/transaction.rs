use crate::common::RecordKey;
use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::store::indexed::object_store::{DatabaseState, ObjectStore};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Access mode of a native transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
    /// Only available while a database is being upgraded. Sees every object store and
    /// may create or delete stores and indexes.
    VersionChange,
}

/// Lifecycle of a native transaction.
///
/// `Started` until the body runs, `Running` while it does, then exactly one of
/// `Committed` or `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Started,
    Running,
    Committed,
    Aborted,
}

impl Display for TransactionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Started => write!(f, "started"),
            TransactionState::Running => write!(f, "running"),
            TransactionState::Committed => write!(f, "committed"),
            TransactionState::Aborted => write!(f, "aborted"),
        }
    }
}

/// A unit of work against an indexed database.
///
/// The transaction works on a private copy of the database taken when it started;
/// nothing it does is visible to anyone else until it commits. Transactions are handed
/// out by [`crate::store::indexed::IndexedDatabase::transaction`] and by upgrades, never
/// constructed directly.
pub struct NativeTransaction {
    id: u64,
    scope: Vec<String>,
    mode: TransactionMode,
    state: TransactionState,
    working: DatabaseState,
}

impl NativeTransaction {
    pub(crate) fn new(scope: Vec<String>, mode: TransactionMode, working: DatabaseState) -> Self {
        NativeTransaction {
            id: NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed),
            scope,
            mode,
            state: TransactionState::Started,
            working,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Object stores this transaction may touch.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Version of the database as seen by this transaction.
    pub fn version(&self) -> u32 {
        self.working.version
    }

    pub fn object_store_names(&self) -> Vec<String> {
        self.working.stores.keys().cloned().collect()
    }

    pub fn contains_object_store(&self, name: &str) -> bool {
        self.working.stores.contains_key(name)
    }

    pub fn create_object_store(&mut self, name: &str, key_path: &str) -> DepositResult<()> {
        self.ensure_version_change("create an object store")?;
        if self.working.stores.contains_key(name) {
            return Err(DepositError::new(
                &format!("Object store {} already exists", name),
                ErrorKind::InvalidOperation,
            ));
        }
        if key_path.trim().is_empty() {
            return Err(DepositError::new(
                &format!("Object store {} needs a key path", name),
                ErrorKind::ConfigurationError,
            ));
        }

        self.working
            .stores
            .insert(name.to_string(), ObjectStore::new(key_path));
        self.scope.push(name.to_string());
        Ok(())
    }

    pub fn delete_object_store(&mut self, name: &str) -> DepositResult<()> {
        self.ensure_version_change("delete an object store")?;
        match self.working.stores.remove(name) {
            Some(_) => {
                self.scope.retain(|store| store != name);
                Ok(())
            }
            None => Err(missing_store(name)),
        }
    }

    pub fn create_index(&mut self, store: &str, name: &str, key_path: &str) -> DepositResult<()> {
        self.ensure_version_change("create an index")?;
        self.store_mut(store)?.create_index(name, key_path)
    }

    pub fn delete_index(&mut self, store: &str, name: &str) -> DepositResult<()> {
        self.ensure_version_change("delete an index")?;
        if self.store_mut(store)?.delete_index(name) {
            Ok(())
        } else {
            Err(DepositError::new(
                &format!("Index {} does not exist on {}", name, store),
                ErrorKind::IndexingError,
            ))
        }
    }

    pub fn index_names(&self, store: &str) -> DepositResult<Vec<String>> {
        Ok(self.store(store)?.index_names())
    }

    /// Key path of `store`, i.e. its primary-key field.
    pub fn key_path(&self, store: &str) -> DepositResult<String> {
        Ok(self.store(store)?.key_path().to_string())
    }

    pub fn get(&self, store: &str, key: &RecordKey) -> DepositResult<Option<Value>> {
        Ok(self.store(store)?.get(key).cloned())
    }

    /// Every entry of `store` in key order.
    pub fn get_all(&self, store: &str) -> DepositResult<Vec<(RecordKey, Value)>> {
        Ok(self.store(store)?.entries())
    }

    pub fn get_all_by_index(
        &self,
        store: &str,
        index: &str,
        key: &RecordKey,
    ) -> DepositResult<Vec<(RecordKey, Value)>> {
        self.store(store)?.get_by_index(index, key)
    }

    pub fn count(&self, store: &str) -> DepositResult<usize> {
        Ok(self.store(store)?.len())
    }

    /// Stores `value` under the key found at the store's key path.
    pub fn put(&mut self, store: &str, value: Value) -> DepositResult<RecordKey> {
        self.ensure_writable()?;
        self.store_mut(store)?.put(value)
    }

    pub fn delete(&mut self, store: &str, key: &RecordKey) -> DepositResult<()> {
        self.ensure_writable()?;
        self.store_mut(store)?.delete(key);
        Ok(())
    }

    pub fn clear(&mut self, store: &str) -> DepositResult<()> {
        self.ensure_writable()?;
        self.store_mut(store)?.clear();
        Ok(())
    }

    /// Marks the transaction aborted. Nothing it wrote will be committed.
    pub fn abort(&mut self) {
        if self.is_active() {
            log::debug!("Transaction {} aborted", self.id);
            self.state = TransactionState::Aborted;
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            TransactionState::Started | TransactionState::Running
        )
    }

    pub(crate) fn begin(&mut self) {
        if self.state == TransactionState::Started {
            self.state = TransactionState::Running;
        }
    }

    pub(crate) fn mark_committed(&mut self) {
        self.state = TransactionState::Committed;
    }

    pub(crate) fn working(&self) -> &DatabaseState {
        &self.working
    }

    pub(crate) fn set_version(&mut self, version: u32) {
        self.working.version = version;
    }

    fn ensure_active(&self) -> DepositResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DepositError::new(
                &format!("Transaction {} is already {}", self.id, self.state),
                ErrorKind::InvalidOperation,
            ))
        }
    }

    fn ensure_writable(&self) -> DepositResult<()> {
        self.ensure_active()?;
        if self.mode == TransactionMode::ReadOnly {
            return Err(DepositError::new(
                &format!("Transaction {} is read-only", self.id),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn ensure_version_change(&self, action: &str) -> DepositResult<()> {
        self.ensure_active()?;
        if self.mode != TransactionMode::VersionChange {
            log::error!("Cannot {} outside of an upgrade", action);
            return Err(DepositError::new(
                &format!("Cannot {} outside of an upgrade", action),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }

    fn in_scope(&self, store: &str) -> DepositResult<()> {
        if self.mode == TransactionMode::VersionChange || self.scope.iter().any(|s| s == store) {
            Ok(())
        } else {
            Err(DepositError::new(
                &format!("Object store {} is not in the scope of transaction {}", store, self.id),
                ErrorKind::InvalidOperation,
            ))
        }
    }

    fn store(&self, name: &str) -> DepositResult<&ObjectStore> {
        self.ensure_active()?;
        self.in_scope(name)?;
        self.working.stores.get(name).ok_or_else(|| missing_store(name))
    }

    fn store_mut(&mut self, name: &str) -> DepositResult<&mut ObjectStore> {
        self.ensure_active()?;
        self.in_scope(name)?;
        self.working
            .stores
            .get_mut(name)
            .ok_or_else(|| missing_store(name))
    }
}

fn missing_store(name: &str) -> DepositError {
    DepositError::new(
        &format!("Object store {} does not exist", name),
        ErrorKind::TableNotFound,
    )
}
