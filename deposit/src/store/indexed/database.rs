use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::store::indexed::object_store::DatabaseState;
use crate::store::indexed::{NativeTransaction, TransactionMode, TransactionState};
use itertools::Itertools;
use parking_lot::{Mutex, ReentrantMutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared storage of one named database, owned by its factory.
pub(crate) struct DatabaseStorage {
    name: String,
    state: Atomic<DatabaseState>,
    // serializes read-write and version-change transactions
    write_lock: ReentrantMutex<()>,
    // scopes of the writing transactions currently running, `None` covers every store
    active_scopes: Mutex<Vec<Option<Vec<String>>>>,
    deleted: AtomicBool,
}

impl DatabaseStorage {
    pub(crate) fn new(name: &str) -> Self {
        DatabaseStorage {
            name: name.to_string(),
            state: atomic(DatabaseState::default()),
            write_lock: ReentrantMutex::new(()),
            active_scopes: Mutex::new(Vec::new()),
            deleted: AtomicBool::new(false),
        }
    }

    pub(crate) fn version(&self) -> u32 {
        self.state.read_with(|state| state.version)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }

    /// Registers a writing transaction over `scope` until the returned guard drops.
    ///
    /// Must be called with `write_lock` held, so any scope already registered belongs to
    /// an enclosing transaction on the same thread. Committing a nested write on a store
    /// the enclosing transaction also covers would be overwritten by the outer commit,
    /// so overlapping scopes are refused.
    fn claim(&self, scope: Option<Vec<String>>) -> DepositResult<ActiveScope<'_>> {
        let mut active = self.active_scopes.lock();
        if let Some(enclosing) = active.iter().find(|other| overlaps(other, &scope)) {
            let tables = match (enclosing, &scope) {
                (Some(enclosing), Some(scope)) => scope
                    .iter()
                    .filter(|name| enclosing.contains(*name))
                    .join(", "),
                (_, Some(scope)) => scope.iter().join(", "),
                (Some(enclosing), None) => enclosing.iter().join(", "),
                (None, None) => String::new(),
            };
            log::error!(
                "Nested write on [{}] of {} inside a running transaction",
                tables,
                self.name
            );
            return Err(DepositError::new(
                &format!(
                    "Cannot write to [{}] of {} while an enclosing transaction on them is running",
                    tables, self.name
                ),
                ErrorKind::InvalidOperation,
            ));
        }
        active.push(scope);
        Ok(ActiveScope { storage: self })
    }
}

fn overlaps(left: &Option<Vec<String>>, right: &Option<Vec<String>>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left.iter().any(|name| right.contains(name)),
        _ => true,
    }
}

struct ActiveScope<'a> {
    storage: &'a DatabaseStorage,
}

impl Drop for ActiveScope<'_> {
    fn drop(&mut self) {
        self.storage.active_scopes.lock().pop();
    }
}

/// A connection to an indexed database.
///
/// Connections are opened through [`crate::store::indexed::IndexedFactory::open`].
/// Clones share the same connection; closing it makes every later transaction fail and
/// aborts transactions that are still running when they try to commit.
#[derive(Clone)]
pub struct IndexedDatabase {
    inner: Arc<IndexedDatabaseInner>,
}

impl std::fmt::Debug for IndexedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedDatabase")
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

struct IndexedDatabaseInner {
    storage: Arc<DatabaseStorage>,
    closed: AtomicBool,
}

impl IndexedDatabase {
    pub(crate) fn new(storage: Arc<DatabaseStorage>) -> Self {
        IndexedDatabase {
            inner: Arc::new(IndexedDatabaseInner {
                storage,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.storage.name
    }

    pub fn version(&self) -> u32 {
        self.inner.storage.version()
    }

    pub fn object_store_names(&self) -> Vec<String> {
        self.inner
            .storage
            .state
            .read_with(|state| state.stores.keys().cloned().collect())
    }

    /// Index names of an object store, empty if the store does not exist.
    pub fn index_names(&self, store: &str) -> Vec<String> {
        self.inner.storage.state.read_with(|state| {
            state
                .stores
                .get(store)
                .map(|s| s.index_names())
                .unwrap_or_default()
        })
    }

    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            log::debug!("Closed connection to database {}", self.name());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
            || self.inner.storage.deleted.load(Ordering::Acquire)
    }

    /// Runs `body` in a transaction over the object stores in `scope`.
    ///
    /// The body works on a private snapshot. If it returns `Ok`, the transaction commits
    /// and every scoped store is published at once; otherwise nothing is.
    ///
    /// # Errors
    /// - [`ErrorKind::StoreAlreadyClosed`] if the connection is closed before starting.
    /// - [`ErrorKind::TableNotFound`] if a scoped store does not exist.
    /// - [`ErrorKind::TransactionCallbackFailed`] wrapping the error returned by `body`.
    /// - [`ErrorKind::TransactionAborted`] if the commit fails, for example because the
    ///   connection was closed while the body was running.
    pub fn transaction<R, F>(&self, scope: &[&str], mode: TransactionMode, body: F) -> DepositResult<R>
    where
        F: FnOnce(&mut NativeTransaction) -> DepositResult<R>,
    {
        if mode == TransactionMode::VersionChange {
            return Err(DepositError::new(
                "Version-change transactions only run during an upgrade",
                ErrorKind::InvalidOperation,
            ));
        }
        self.ensure_open()?;

        let storage = &self.inner.storage;
        let _guard = match mode {
            TransactionMode::ReadOnly => None,
            _ => Some(storage.write_lock.lock()),
        };

        let _scope = match mode {
            TransactionMode::ReadOnly => None,
            _ => Some(storage.claim(Some(scope.iter().map(|s| s.to_string()).collect()))?),
        };

        let snapshot = storage.state.read_with(|state| state.clone());
        if let Some(missing) = scope.iter().find(|s| !snapshot.stores.contains_key(**s)) {
            log::error!("Object store {} does not exist in {}", missing, storage.name);
            return Err(DepositError::new(
                &format!("Object store {} does not exist in {}", missing, storage.name),
                ErrorKind::TableNotFound,
            ));
        }

        let tables = scope.iter().join(", ");
        let mut tx = NativeTransaction::new(
            scope.iter().map(|s| s.to_string()).collect(),
            mode,
            snapshot,
        );
        tx.begin();

        let result = match body(&mut tx) {
            Ok(result) => result,
            Err(err) => {
                tx.abort();
                log::error!("Transaction callback failed for tables [{}]: {}", tables, err);
                return Err(DepositError::new_with_cause(
                    &format!("Transaction callback failed for tables [{}]", tables),
                    ErrorKind::TransactionCallbackFailed,
                    err,
                ));
            }
        };

        match self.commit(&mut tx) {
            Ok(()) => Ok(result),
            Err(err) => {
                tx.abort();
                log::error!("Transaction aborted for tables [{}]: {}", tables, err);
                Err(DepositError::new_with_cause(
                    &format!("Transaction aborted for tables [{}]", tables),
                    ErrorKind::TransactionAborted,
                    err,
                ))
            }
        }
    }

    /// Runs a version-change transaction moving the database to `new_version`.
    ///
    /// `body` receives the old and new versions. The version only moves if `body`
    /// succeeds; its error is returned unchanged.
    pub(crate) fn upgrade<F>(&self, new_version: u32, body: F) -> DepositResult<()>
    where
        F: FnOnce(&IndexedDatabase, u32, u32, &mut NativeTransaction) -> DepositResult<()>,
    {
        self.ensure_open()?;
        let storage = &self.inner.storage;
        let _guard = storage.write_lock.lock();
        let _scope = storage.claim(None)?;

        let snapshot = storage.state.read_with(|state| state.clone());
        let old_version = snapshot.version;
        if new_version < old_version {
            log::error!(
                "Database {} is at version {}, cannot open it at version {}",
                storage.name,
                old_version,
                new_version
            );
            return Err(DepositError::new(
                &format!(
                    "Database {} is at version {}, cannot open it at version {}",
                    storage.name, old_version, new_version
                ),
                ErrorKind::VersionError,
            ));
        }
        if new_version == old_version {
            return Ok(());
        }

        let scope = snapshot.stores.keys().cloned().collect();
        let mut tx = NativeTransaction::new(scope, TransactionMode::VersionChange, snapshot);
        tx.begin();

        log::info!(
            "Upgrading database {} from version {} to {}",
            storage.name,
            old_version,
            new_version
        );
        if let Err(err) = body(self, old_version, new_version, &mut tx) {
            tx.abort();
            return Err(err);
        }

        tx.set_version(new_version);
        self.commit(&mut tx)
    }

    fn commit(&self, tx: &mut NativeTransaction) -> DepositResult<()> {
        if tx.state() != TransactionState::Running {
            return Err(DepositError::new(
                &format!("Transaction {} was {} before commit", tx.id(), tx.state()),
                ErrorKind::TransactionAborted,
            ));
        }
        if self.is_closed() {
            return Err(DepositError::new(
                &format!("Connection to {} closed before commit", self.name()),
                ErrorKind::StoreAlreadyClosed,
            ));
        }

        match tx.mode() {
            TransactionMode::ReadOnly => {}
            TransactionMode::ReadWrite => {
                let working = tx.working();
                self.inner.storage.state.write_with(|state| {
                    for name in tx.scope() {
                        if let Some(store) = working.stores.get(name) {
                            state.stores.insert(name.clone(), store.clone());
                        }
                    }
                });
            }
            TransactionMode::VersionChange => {
                let working = tx.working().clone();
                self.inner.storage.state.write_with(|state| *state = working);
            }
        }
        tx.mark_committed();
        Ok(())
    }

    fn ensure_open(&self) -> DepositResult<()> {
        if self.is_closed() {
            log::error!("Connection to database {} is closed", self.name());
            return Err(DepositError::new(
                &format!("Connection to database {} is closed", self.name()),
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }
}
