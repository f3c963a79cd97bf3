use crate::common::{expiry_marker, RecordKey, SharedClock, StoredEntry};
use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::schema::Schema;
use crate::store::indexed::migration::upgrade_schema;
use crate::store::indexed::{
    IndexedDatabase, IndexedFactory, MigrationFn, NativeTransaction, TransactionMode,
};
use crate::store::StorageAdapter;
use crate::transaction::{TableSnapshot, TableSnapshots};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Connection lifecycle of an [`IndexedAdapter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unopened,
    Opening,
    Open,
    Closed,
}

enum Connection {
    Unopened,
    Opening,
    Open(IndexedDatabase),
    Closed,
}

impl Connection {
    fn state(&self) -> ConnectionState {
        match self {
            Connection::Unopened => ConnectionState::Unopened,
            Connection::Opening => ConnectionState::Opening,
            Connection::Open(_) => ConnectionState::Open,
            Connection::Closed => ConnectionState::Closed,
        }
    }
}

/// Storage adapter over an indexed, transactional database.
///
/// The database is named after the namespace and opened at the schema version on first
/// use. Opening at a new version creates the declared tables and indexes and runs the
/// configured [`MigrationFn`]. Every CRUD call then runs in its own native transaction,
/// and [`IndexedAdapter::atomic_transaction`] gives all-or-nothing writes across tables.
#[derive(Clone)]
pub struct IndexedAdapter {
    inner: Arc<IndexedAdapterInner>,
}

impl IndexedAdapter {
    /// Creates an indexed adapter. Fails if the schema is invalid.
    ///
    /// Nothing is opened until the first operation or an explicit `connect`.
    pub fn new(
        namespace: &str,
        version: u32,
        schema: Schema,
        factory: IndexedFactory,
        clock: SharedClock,
        migration: Option<MigrationFn>,
    ) -> DepositResult<Self> {
        schema.validate()?;
        Ok(IndexedAdapter {
            inner: Arc::new(IndexedAdapterInner {
                name: namespace.to_string(),
                version,
                schema,
                factory,
                clock,
                migration,
                connection: Mutex::new(Connection::Unopened),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.lock().state()
    }

    /// The open database, connecting first if needed.
    pub fn database(&self) -> DepositResult<IndexedDatabase> {
        self.inner.database()
    }

    /// Runs `f` over snapshots of `tables` inside one native read-write transaction.
    ///
    /// Each table's final snapshot replaces the table's content before the commit. If
    /// `f` or any write-back fails, no table is changed. With a `ttl`, every record
    /// written back expires at `now + ttl`.
    ///
    /// # Errors
    /// - [`ErrorKind::TransactionCallbackFailed`] wrapping an error from `f`.
    /// - [`ErrorKind::TransactionAborted`] if the commit itself fails.
    pub fn atomic_transaction<R, F>(
        &self,
        tables: &[&str],
        ttl: Option<Duration>,
        f: F,
    ) -> DepositResult<R>
    where
        F: FnOnce(&mut TableSnapshots) -> DepositResult<R>,
    {
        self.inner.atomic_transaction(tables, ttl, f)
    }

    /// Live records of `table` whose `index` field equals `key`.
    pub fn get_all_by_index(
        &self,
        table: &str,
        index: &str,
        key: &RecordKey,
    ) -> DepositResult<Vec<Value>> {
        self.inner.get_all_by_index(table, index, key)
    }

    /// Indexes that exist on `table`.
    pub fn index_names(&self, table: &str) -> DepositResult<Vec<String>> {
        self.inner.schema.get(table)?;
        Ok(self.inner.database()?.index_names(table))
    }
}

impl StorageAdapter for IndexedAdapter {
    fn connect(&self) -> DepositResult<()> {
        self.inner.connect()
    }

    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Open
    }

    fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    fn get(&self, table: &str, key: &RecordKey) -> DepositResult<Option<Value>> {
        self.inner.get(table, key)
    }

    fn get_all(&self, table: &str) -> DepositResult<Vec<Value>> {
        self.inner.get_all(table)
    }

    fn put(&self, table: &str, record: Value, ttl: Option<Duration>) -> DepositResult<()> {
        self.inner.bulk_put(table, vec![record], ttl)
    }

    fn delete(&self, table: &str, key: &RecordKey) -> DepositResult<()> {
        self.inner.bulk_delete(table, std::slice::from_ref(key))
    }

    fn clear(&self, table: &str) -> DepositResult<()> {
        self.inner.clear(table)
    }

    fn bulk_put(
        &self,
        table: &str,
        records: Vec<Value>,
        ttl: Option<Duration>,
    ) -> DepositResult<()> {
        self.inner.bulk_put(table, records, ttl)
    }

    fn bulk_delete(&self, table: &str, keys: &[RecordKey]) -> DepositResult<()> {
        self.inner.bulk_delete(table, keys)
    }

    fn close(&self) -> DepositResult<()> {
        self.inner.close();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.connection_state() == ConnectionState::Closed
    }
}

struct IndexedAdapterInner {
    name: String,
    version: u32,
    schema: Schema,
    factory: IndexedFactory,
    clock: SharedClock,
    migration: Option<MigrationFn>,
    connection: Mutex<Connection>,
}

impl IndexedAdapterInner {
    fn connect(&self) -> DepositResult<()> {
        let mut connection = self.connection.lock();
        match &*connection {
            Connection::Open(_) => return Ok(()),
            Connection::Closed => return Err(self.closed_error()),
            Connection::Unopened | Connection::Opening => {}
        }

        *connection = Connection::Opening;
        let schema = &self.schema;
        let migration = self.migration.as_ref();
        let opened = self.factory.open(&self.name, self.version, |db, old, new, tx| {
            upgrade_schema(db, old, new, tx, schema, migration)
        });

        match opened {
            Ok(database) => {
                self.warn_missing_tables(&database);
                log::debug!(
                    "Connected indexed store {} at version {}",
                    self.name,
                    database.version()
                );
                *connection = Connection::Open(database);
                Ok(())
            }
            Err(err) => {
                log::error!("Failed to open indexed store {}: {}", self.name, err);
                *connection = Connection::Unopened;
                Err(err)
            }
        }
    }

    fn warn_missing_tables(&self, database: &IndexedDatabase) {
        let existing = database.object_store_names();
        for table in self.schema.table_names() {
            if !existing.contains(&table) {
                log::warn!(
                    "Table {} is declared but does not exist at version {}, bump the schema version to create it",
                    table,
                    self.version
                );
            }
        }
    }

    fn database(&self) -> DepositResult<IndexedDatabase> {
        self.connect()?;
        match &*self.connection.lock() {
            Connection::Open(database) => Ok(database.clone()),
            Connection::Closed => Err(self.closed_error()),
            Connection::Unopened | Connection::Opening => Err(DepositError::new(
                &format!("Indexed store {} is not open", self.name),
                ErrorKind::StoreNotInitialized,
            )),
        }
    }

    fn closed_error(&self) -> DepositError {
        log::error!("Indexed store {} is already closed", self.name);
        DepositError::new(
            &format!("Indexed store {} is already closed", self.name),
            ErrorKind::StoreAlreadyClosed,
        )
    }

    fn close(&self) {
        let mut connection = self.connection.lock();
        if let Connection::Open(database) = &*connection {
            database.close();
        }
        *connection = Connection::Closed;
    }

    /// Splits raw entries into live records and keys to purge.
    fn split_live(&self, entries: Vec<(RecordKey, Value)>, table: &str) -> (Vec<Value>, Vec<RecordKey>) {
        let now = self.clock.now_millis();
        let mut live = Vec::with_capacity(entries.len());
        let mut stale = Vec::new();
        for (key, stored) in entries {
            match StoredEntry::unwrap(stored) {
                Ok(entry) if entry.is_expired(now) => {
                    log::debug!("Entry {} of {} expired, purging", key, table);
                    stale.push(key);
                }
                Ok(entry) => live.push(entry.record),
                Err(err) => {
                    log::warn!("Corrupted entry {} of {}: {}, purging", key, table, err);
                    stale.push(key);
                }
            }
        }
        (live, stale)
    }

    fn purge(&self, database: &IndexedDatabase, table: &str, keys: Vec<RecordKey>) {
        if keys.is_empty() {
            return;
        }
        let purged = database.transaction(&[table], TransactionMode::ReadWrite, |tx| {
            for key in &keys {
                tx.delete(table, key)?;
            }
            Ok(())
        });
        if let Err(err) = purged {
            log::warn!("Failed to purge {} entries of {}: {}", keys.len(), table, err);
        }
    }

    fn get(&self, table: &str, key: &RecordKey) -> DepositResult<Option<Value>> {
        self.schema.get(table)?;
        let database = self.database()?;
        let stored = database.transaction(&[table], TransactionMode::ReadOnly, |tx| {
            tx.get(table, key)
        })?;

        match stored {
            None => Ok(None),
            Some(stored) => {
                let (mut live, stale) = self.split_live(vec![(key.clone(), stored)], table);
                self.purge(&database, table, stale);
                Ok(live.pop())
            }
        }
    }

    fn get_all(&self, table: &str) -> DepositResult<Vec<Value>> {
        self.schema.get(table)?;
        let database = self.database()?;
        let entries = database.transaction(&[table], TransactionMode::ReadOnly, |tx| {
            tx.get_all(table)
        })?;

        let (live, stale) = self.split_live(entries, table);
        self.purge(&database, table, stale);
        Ok(live)
    }

    fn get_all_by_index(
        &self,
        table: &str,
        index: &str,
        key: &RecordKey,
    ) -> DepositResult<Vec<Value>> {
        self.schema.get(table)?;
        let database = self.database()?;
        let entries = database.transaction(&[table], TransactionMode::ReadOnly, |tx| {
            tx.get_all_by_index(table, index, key)
        })?;

        let (live, stale) = self.split_live(entries, table);
        self.purge(&database, table, stale);
        Ok(live)
    }

    fn bulk_put(
        &self,
        table: &str,
        records: Vec<Value>,
        ttl: Option<Duration>,
    ) -> DepositResult<()> {
        // missing keys are reported before the backend is touched
        for record in &records {
            self.schema.key_of(table, record)?;
        }
        let database = self.database()?;
        let marker = expiry_marker(ttl, self.clock.now_millis());
        let stored = records
            .into_iter()
            .map(|record| StoredEntry::new(record, marker).wrap())
            .collect::<DepositResult<Vec<_>>>()?;

        database.transaction(&[table], TransactionMode::ReadWrite, |tx| {
            for value in stored {
                tx.put(table, value)?;
            }
            Ok(())
        })
    }

    fn bulk_delete(&self, table: &str, keys: &[RecordKey]) -> DepositResult<()> {
        self.schema.get(table)?;
        let database = self.database()?;
        database.transaction(&[table], TransactionMode::ReadWrite, |tx| {
            for key in keys {
                tx.delete(table, key)?;
            }
            Ok(())
        })
    }

    fn clear(&self, table: &str) -> DepositResult<()> {
        self.schema.get(table)?;
        let database = self.database()?;
        database.transaction(&[table], TransactionMode::ReadWrite, |tx| tx.clear(table))
    }

    fn atomic_transaction<R, F>(
        &self,
        tables: &[&str],
        ttl: Option<Duration>,
        f: F,
    ) -> DepositResult<R>
    where
        F: FnOnce(&mut TableSnapshots) -> DepositResult<R>,
    {
        for table in tables {
            self.schema.get(table)?;
        }
        let database = self.database()?;
        let now = self.clock.now_millis();
        let marker = expiry_marker(ttl, now);

        database.transaction(tables, TransactionMode::ReadWrite, |tx| {
            let mut snapshots = TableSnapshots::new();
            for table in tables {
                let key_field = self.schema.key_field(table)?;
                let (live, _) = self.split_live(tx.get_all(table)?, table);
                snapshots.insert(table, TableSnapshot::new(key_field, live));
            }

            let result = f(&mut snapshots)?;
            for (table, snapshot) in snapshots.into_tables() {
                write_back(tx, &table, snapshot, marker)?;
            }
            Ok(result)
        })
    }
}

/// Replaces the content of `table` with `snapshot`.
fn write_back(
    tx: &mut NativeTransaction,
    table: &str,
    snapshot: TableSnapshot,
    marker: Option<i64>,
) -> DepositResult<()> {
    tx.clear(table)?;
    for record in snapshot.into_records() {
        tx.put(table, StoredEntry::new(record, marker).wrap()?)?;
    }
    Ok(())
}
