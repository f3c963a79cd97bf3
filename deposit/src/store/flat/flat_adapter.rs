use crate::common::{
    expiry_marker, percent_encode, RecordKey, SharedClock, StoredEntry, KEY_SEPARATOR,
};
use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::schema::Schema;
use crate::store::{KeyValueStore, StorageAdapter};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Storage adapter over a flat, string-keyed [`KeyValueStore`].
///
/// Each record is one entry keyed `enc(namespace):version:enc(table):enc(key)` where
/// `enc` is [`percent_encode`], so no segment can contain the separator. The value is
/// the record serialized as JSON with its expiry marker inline.
///
/// Reading a table is a prefix scan over `enc(namespace):version:enc(table):`, and since
/// the schema version is part of every key, bumping the version starts from an empty
/// table without touching the entries of older versions.
///
/// There are no transactions: `bulk_put`, `bulk_delete` and `clear` attempt every entry
/// independently and report the first failure once all have been tried.
#[derive(Clone)]
pub struct FlatAdapter {
    inner: Arc<FlatAdapterInner>,
}

impl FlatAdapter {
    /// Creates a flat adapter. Fails if the schema is invalid.
    pub fn new(
        namespace: &str,
        version: u32,
        schema: Schema,
        store: KeyValueStore,
        clock: SharedClock,
    ) -> DepositResult<Self> {
        schema.validate()?;
        Ok(FlatAdapter {
            inner: Arc::new(FlatAdapterInner {
                namespace: namespace.to_string(),
                version,
                schema,
                store,
                clock,
                connected: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    /// The backing store, shared with this adapter.
    pub fn store(&self) -> &KeyValueStore {
        &self.inner.store
    }

    /// Prefix shared by every entry of `table`.
    pub fn table_prefix(&self, table: &str) -> String {
        self.inner.table_prefix(table)
    }

    /// Backend key of the record identified by `key` in `table`.
    pub fn entry_key(&self, table: &str, key: &RecordKey) -> String {
        self.inner.entry_key(table, key)
    }
}

impl StorageAdapter for FlatAdapter {
    fn connect(&self) -> DepositResult<()> {
        self.inner.connect()
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
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
        self.inner.put(table, record, ttl)
    }

    fn delete(&self, table: &str, key: &RecordKey) -> DepositResult<()> {
        self.inner.delete(table, key)
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
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

struct FlatAdapterInner {
    namespace: String,
    version: u32,
    schema: Schema,
    store: KeyValueStore,
    clock: SharedClock,
    connected: AtomicBool,
    closed: AtomicBool,
}

impl FlatAdapterInner {
    fn table_prefix(&self, table: &str) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}",
            percent_encode(&self.namespace),
            self.version,
            percent_encode(table),
            sep = KEY_SEPARATOR
        )
    }

    fn entry_key(&self, table: &str, key: &RecordKey) -> String {
        let mut entry_key = self.table_prefix(table);
        entry_key.push_str(&percent_encode(&key.to_string()));
        entry_key
    }

    fn connect(&self) -> DepositResult<()> {
        if self.closed.load(Ordering::Acquire) {
            log::error!("Flat store {} is already closed", self.namespace);
            return Err(DepositError::new(
                &format!("Flat store {} is already closed", self.namespace),
                ErrorKind::StoreAlreadyClosed,
            ));
        }

        // the key-value store needs no handshake
        if !self.connected.swap(true, Ordering::AcqRel) {
            log::debug!(
                "Connected flat store {} at version {}",
                self.namespace,
                self.version
            );
        }
        Ok(())
    }

    fn get(&self, table: &str, key: &RecordKey) -> DepositResult<Option<Value>> {
        self.connect()?;
        self.schema.get(table)?;

        let entry_key = self.entry_key(table, key);
        let raw = match self.store.get_item(&entry_key)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let now = self.clock.now_millis();
        Ok(self.live_record(&entry_key, &raw, now))
    }

    fn get_all(&self, table: &str) -> DepositResult<Vec<Value>> {
        self.connect()?;
        self.schema.get(table)?;

        let now = self.clock.now_millis();
        let entries = self.store.scan_prefix(&self.table_prefix(table))?;
        Ok(entries
            .into_iter()
            .filter_map(|(entry_key, raw)| self.live_record(&entry_key, &raw, now))
            .collect())
    }

    /// Decodes an entry, purging it when it is corrupted or expired.
    fn live_record(&self, entry_key: &str, raw: &str, now: i64) -> Option<Value> {
        match StoredEntry::decode(raw) {
            Ok(entry) if entry.is_expired(now) => {
                log::debug!("Entry {} expired, purging", entry_key);
                self.purge(entry_key);
                None
            }
            Ok(entry) => Some(entry.record),
            Err(err) => {
                log::warn!("Corrupted entry {}: {}, purging", entry_key, err);
                self.purge(entry_key);
                None
            }
        }
    }

    fn purge(&self, entry_key: &str) {
        if let Err(err) = self.store.remove_item(entry_key) {
            log::warn!("Failed to purge entry {}: {}", entry_key, err);
        }
    }

    fn put(&self, table: &str, record: Value, ttl: Option<Duration>) -> DepositResult<()> {
        let key = self.schema.key_of(table, &record)?;
        self.connect()?;
        self.write(table, &key, record, ttl)
    }

    fn write(
        &self,
        table: &str,
        key: &RecordKey,
        record: Value,
        ttl: Option<Duration>,
    ) -> DepositResult<()> {
        let marker = expiry_marker(ttl, self.clock.now_millis());
        let raw = StoredEntry::new(record, marker).encode()?;
        let entry_key = self.entry_key(table, key);
        self.store.set_item(&entry_key, &raw).map_err(|err| {
            log::error!("Failed to write entry {}: {}", entry_key, err);
            err
        })
    }

    fn delete(&self, table: &str, key: &RecordKey) -> DepositResult<()> {
        self.connect()?;
        self.schema.get(table)?;
        let entry_key = self.entry_key(table, key);
        self.store.remove_item(&entry_key).map_err(|err| {
            log::error!("Failed to delete entry {}: {}", entry_key, err);
            err
        })
    }

    fn clear(&self, table: &str) -> DepositResult<()> {
        self.connect()?;
        self.schema.get(table)?;

        let entries = self.store.scan_prefix(&self.table_prefix(table))?;
        first_error(
            entries
                .into_iter()
                .map(|(entry_key, _)| self.store.remove_item(&entry_key)),
        )
    }

    fn bulk_put(
        &self,
        table: &str,
        records: Vec<Value>,
        ttl: Option<Duration>,
    ) -> DepositResult<()> {
        // every key is checked before anything is written
        let keyed = records
            .into_iter()
            .map(|record| Ok((self.schema.key_of(table, &record)?, record)))
            .collect::<DepositResult<Vec<_>>>()?;
        self.connect()?;

        first_error(
            keyed
                .into_iter()
                .map(|(key, record)| self.write(table, &key, record, ttl)),
        )
    }

    fn bulk_delete(&self, table: &str, keys: &[RecordKey]) -> DepositResult<()> {
        self.connect()?;
        self.schema.get(table)?;
        first_error(
            keys.iter()
                .map(|key| self.store.remove_item(&self.entry_key(table, key))),
        )
    }

    fn close(&self) -> DepositResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.connected.store(false, Ordering::Release);
        self.store.flush()
    }
}

/// Drains `results` and returns the first error, if any.
fn first_error(results: impl Iterator<Item = DepositResult<()>>) -> DepositResult<()> {
    let mut first = None;
    let mut failures = 0usize;
    for result in results {
        if let Err(err) = result {
            failures += 1;
            if first.is_none() {
                first = Some(err);
            }
        }
    }

    match first {
        Some(err) => {
            log::error!("{} entry operations failed, first: {}", failures, err);
            Err(err)
        }
        None => Ok(()),
    }
}
