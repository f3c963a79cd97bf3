use crate::common::{RecordKey, DEFAULT_MEMO_CAPACITY};
use crate::deposit_builder::DepositBuilder;
use crate::deposit_config::DepositConfig;
use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::query::QueryBuilder;
use crate::schema::Schema;
use crate::store::{Adapter, StorageAdapter};
use crate::transaction::{PatchOp, TableSnapshot, TableSnapshots};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The entry point of a Deposit store.
///
/// `Deposit` wraps one [`Adapter`] and adds the multi-step operations built on top of
/// it: queries, transactions and patches. Clones share the same adapter.
///
/// Every call completes or fails before returning. The backend connects lazily on the
/// first operation.
///
/// # Examples
///
/// ```rust,ignore
/// use deposit::deposit::Deposit;
/// use deposit::schema::TableSchema;
/// use serde_json::json;
///
/// let deposit = Deposit::builder()
///     .namespace("shop")
///     .table("products", TableSchema::new("sku"))
///     .open()?;
///
/// deposit.put("products", json!({"sku": "A-1", "price": 12}), None)?;
/// let product = deposit.get("products", "A-1")?;
/// ```
#[derive(Clone)]
pub struct Deposit {
    inner: Arc<DepositInner>,
}

impl Deposit {
    pub fn builder() -> DepositBuilder {
        DepositBuilder::new()
    }

    /// Validates `config` and builds the adapter it selects.
    pub fn open(config: DepositConfig) -> DepositResult<Deposit> {
        config.configure()?;
        let adapter = Adapter::from_config(&config)?;
        log::debug!(
            "Opened {} store {} at version {}",
            adapter.kind(),
            config.namespace(),
            config.schema_version()
        );
        Ok(Deposit::new(adapter, config.memo_capacity()))
    }

    /// Wraps a pre-built adapter.
    pub fn with_adapter<A: Into<Adapter>>(adapter: A) -> Deposit {
        Deposit::new(adapter.into(), DEFAULT_MEMO_CAPACITY)
    }

    fn new(adapter: Adapter, memo_capacity: usize) -> Deposit {
        Deposit {
            inner: Arc::new(DepositInner {
                adapter,
                memo_capacity,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn adapter(&self) -> &Adapter {
        &self.inner.adapter
    }

    pub fn schema(&self) -> &Schema {
        self.inner.adapter.schema()
    }

    /// Connects the backend now instead of on first use.
    pub fn connect(&self) -> DepositResult<()> {
        self.inner.ensure_open()?;
        self.inner.adapter.connect()
    }

    pub fn get<K: Into<RecordKey>>(&self, table: &str, key: K) -> DepositResult<Option<Value>> {
        self.inner.ensure_open()?;
        self.inner.adapter.get(table, &key.into())
    }

    /// Like [`Deposit::get`], returning `default` when the record is absent or expired.
    pub fn get_or<K: Into<RecordKey>>(&self, table: &str, key: K, default: Value) -> DepositResult<Value> {
        Ok(self.get(table, key)?.unwrap_or(default))
    }

    /// Reads a record and deserializes it into `T`.
    pub fn get_as<T, K>(&self, table: &str, key: K) -> DepositResult<Option<T>>
    where
        T: DeserializeOwned,
        K: Into<RecordKey>,
    {
        match self.get(table, key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn get_all(&self, table: &str) -> DepositResult<Vec<Value>> {
        self.inner.ensure_open()?;
        self.inner.adapter.get_all(table)
    }

    /// Writes `record`, replacing any record with the same key.
    ///
    /// With a `ttl`, the record stops being visible once `ttl` has elapsed.
    pub fn put(&self, table: &str, record: Value, ttl: Option<Duration>) -> DepositResult<()> {
        self.inner.ensure_open()?;
        self.inner.adapter.put(table, record, ttl)
    }

    /// Serializes `entity` and writes it.
    pub fn put_entity<T: Serialize>(&self, table: &str, entity: &T, ttl: Option<Duration>) -> DepositResult<()> {
        let record = serde_json::to_value(entity)?;
        self.put(table, record, ttl)
    }

    /// Writes many records. Atomic only on the indexed adapter.
    pub fn bulk_put(&self, table: &str, records: Vec<Value>, ttl: Option<Duration>) -> DepositResult<()> {
        self.inner.ensure_open()?;
        self.inner.adapter.bulk_put(table, records, ttl)
    }

    pub fn delete<K: Into<RecordKey>>(&self, table: &str, key: K) -> DepositResult<()> {
        self.inner.ensure_open()?;
        self.inner.adapter.delete(table, &key.into())
    }

    /// Removes many records. Atomic only on the indexed adapter.
    pub fn bulk_delete<K, I>(&self, table: &str, keys: I) -> DepositResult<()>
    where
        K: Into<RecordKey>,
        I: IntoIterator<Item = K>,
    {
        self.inner.ensure_open()?;
        let keys: Vec<RecordKey> = keys.into_iter().map(Into::into).collect();
        self.inner.adapter.bulk_delete(table, &keys)
    }

    pub fn clear(&self, table: &str) -> DepositResult<()> {
        self.inner.ensure_open()?;
        self.inner.adapter.clear(table)
    }

    pub fn count(&self, table: &str) -> DepositResult<usize> {
        self.inner.ensure_open()?;
        self.inner.adapter.count(table)
    }

    /// Starts a fresh query over `table`. Nothing is read until a terminal call.
    pub fn query(&self, table: &str) -> QueryBuilder {
        QueryBuilder::new(self.inner.adapter.clone(), table, self.inner.memo_capacity)
    }

    /// Runs `f` over snapshots of `tables` and writes every table back from its final
    /// snapshot.
    ///
    /// On the indexed adapter this is atomic: if `f` fails, or the backend aborts, no
    /// table changes. On the flat adapter the write-back is a sequence of independent
    /// operations; a failure part way leaves the tables that were already written.
    ///
    /// With a `ttl`, every record written back expires after it.
    ///
    /// # Errors
    /// - [`ErrorKind::TransactionCallbackFailed`] when `f` fails. Nothing was written.
    /// - [`ErrorKind::TransactionAborted`] when the indexed backend aborts the commit.
    /// - [`ErrorKind::TransactionFailed`] when the flat write-back fails. Writes already
    ///   applied are not rolled back.
    pub fn transaction<R, F>(&self, tables: &[&str], f: F, ttl: Option<Duration>) -> DepositResult<R>
    where
        F: FnOnce(&mut TableSnapshots) -> DepositResult<R>,
    {
        self.inner.ensure_open()?;
        match &self.inner.adapter {
            Adapter::Indexed(adapter) => adapter.atomic_transaction(tables, ttl, f),
            Adapter::Flat(_) => self.inner.optimistic_transaction(tables, f, ttl),
        }
    }

    /// Applies `ops` to `table` in order, each one independently.
    ///
    /// Every op is attempted; the first failure is returned afterwards.
    pub fn patch(&self, table: &str, ops: Vec<PatchOp>) -> DepositResult<()> {
        self.inner.ensure_open()?;
        self.schema().get(table)?;

        let adapter = &self.inner.adapter;
        let mut first_error = None;
        for op in ops {
            let name = op.name();
            let result = match op {
                PatchOp::Put { record, ttl } => adapter.put(table, record, ttl),
                PatchOp::Delete { key } => adapter.delete(table, &key),
                PatchOp::Clear => adapter.clear(table),
            };
            if let Err(err) = result {
                log::error!("Patch {} on {} failed: {}", name, table, err);
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Closes the backend. Every later operation fails with `StoreAlreadyClosed`.
    pub fn close(&self) -> DepositResult<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.adapter.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire) || self.inner.adapter.is_closed()
    }
}

struct DepositInner {
    adapter: Adapter,
    memo_capacity: usize,
    closed: AtomicBool,
}

impl DepositInner {
    fn ensure_open(&self) -> DepositResult<()> {
        if self.closed.load(Ordering::Acquire) {
            log::error!("Deposit store is already closed");
            return Err(DepositError::new(
                "Deposit store is already closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        Ok(())
    }

    fn optimistic_transaction<R, F>(&self, tables: &[&str], f: F, ttl: Option<Duration>) -> DepositResult<R>
    where
        F: FnOnce(&mut TableSnapshots) -> DepositResult<R>,
    {
        let names = tables.iter().join(", ");
        let schema = self.adapter.schema();
        let failed = |err: DepositError| {
            log::error!("Transaction failed for tables [{}]: {}", names, err);
            DepositError::new_with_cause(
                &format!(
                    "Transaction failed for tables [{}], writes already applied were not rolled back",
                    names
                ),
                ErrorKind::TransactionFailed,
                err,
            )
        };
        let callback_failed = |err: DepositError| {
            log::error!("Transaction callback failed for tables [{}]: {}", names, err);
            DepositError::new_with_cause(
                &format!("Transaction callback failed for tables [{}]", names),
                ErrorKind::TransactionCallbackFailed,
                err,
            )
        };

        let mut snapshots = TableSnapshots::new();
        for table in tables {
            let key_field = schema.key_field(table)?;
            let records = self.adapter.get_all(table).map_err(failed)?;
            snapshots.insert(table, TableSnapshot::new(key_field, records));
        }

        let result = f(&mut snapshots).map_err(callback_failed)?;

        // a snapshot left with a keyless record must not clear its table
        let staged = snapshots.into_tables();
        for (table, snapshot) in &staged {
            for record in snapshot.records() {
                schema.key_of(table, record).map_err(callback_failed)?;
            }
        }

        for (table, snapshot) in staged {
            self.adapter.clear(&table).map_err(failed)?;
            self.adapter
                .bulk_put(&table, snapshot.into_records(), ttl)
                .map_err(failed)?;
        }
        Ok(result)
    }
}
