//! Configuration management for Deposit.

use crate::common::{
    atomic, system_clock, Atomic, ReadExecutor, SharedClock, WriteExecutor,
    DEFAULT_MEMO_CAPACITY, DEFAULT_NAMESPACE, INITIAL_SCHEMA_VERSION,
};
use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::schema::{Schema, TableSchema};
use crate::store::indexed::{IndexedFactory, MigrationFn};
use crate::store::{AdapterKind, KeyValueStore};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Configuration of a [`crate::deposit::Deposit`] instance.
///
/// Usually assembled through [`crate::deposit_builder::DepositBuilder`]. Every setter
/// fails once the configuration has been used to open a store.
///
/// # Examples
///
/// ```rust,ignore
/// use deposit::deposit_config::DepositConfig;
/// use deposit::schema::TableSchema;
///
/// let config = DepositConfig::new();
/// config.set_namespace("shop")?;
/// config.add_table("products", TableSchema::new("sku"))?;
/// ```
#[derive(Clone)]
pub struct DepositConfig {
    inner: Arc<DepositConfigInner>,
}

impl Default for DepositConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DepositConfig {
    pub fn new() -> Self {
        DepositConfig {
            inner: Arc::new(DepositConfigInner::new()),
        }
    }

    pub fn namespace(&self) -> String {
        self.inner.namespace.read_with(|it| it.clone())
    }

    pub fn set_namespace(&self, namespace: &str) -> DepositResult<()> {
        self.inner.ensure_not_configured("Namespace")?;
        if namespace.trim().is_empty() {
            log::error!("Namespace cannot be empty");
            return Err(DepositError::new(
                "Namespace cannot be empty",
                ErrorKind::ConfigurationError,
            ));
        }
        self.inner
            .namespace
            .write_with(|it| *it = namespace.to_string());
        Ok(())
    }

    pub fn schema_version(&self) -> u32 {
        self.inner.schema_version.load(Ordering::Relaxed)
    }

    pub fn set_schema_version(&self, version: u32) -> DepositResult<()> {
        self.inner.ensure_not_configured("Schema version")?;
        if version == 0 {
            log::error!("Schema version must be at least 1");
            return Err(DepositError::new(
                "Schema version must be at least 1",
                ErrorKind::ConfigurationError,
            ));
        }
        self.inner.schema_version.store(version, Ordering::Relaxed);
        Ok(())
    }

    pub fn schema(&self) -> Schema {
        self.inner.schema.read_with(|it| it.clone())
    }

    /// Replaces the whole schema.
    pub fn set_schema(&self, schema: Schema) -> DepositResult<()> {
        self.inner.ensure_not_configured("Schema")?;
        self.inner.schema.write_with(|it| *it = schema);
        Ok(())
    }

    /// Declares one more table, replacing a previous declaration of the same name.
    pub fn add_table(&self, name: &str, table: TableSchema) -> DepositResult<()> {
        self.inner.ensure_not_configured("Schema")?;
        if name.trim().is_empty() {
            log::error!("Table name cannot be empty");
            return Err(DepositError::new(
                "Table name cannot be empty",
                ErrorKind::ConfigurationError,
            ));
        }
        self.inner.schema.write_with(|it| it.insert(name, table));
        Ok(())
    }

    pub fn adapter_kind(&self) -> AdapterKind {
        self.inner.adapter_kind.read_with(|it| *it)
    }

    pub fn set_adapter_kind(&self, kind: AdapterKind) -> DepositResult<()> {
        self.inner.ensure_not_configured("Adapter kind")?;
        self.inner.adapter_kind.write_with(|it| *it = kind);
        Ok(())
    }

    pub fn clock(&self) -> SharedClock {
        self.inner.clock.read_with(|it| it.clone())
    }

    pub fn set_clock(&self, clock: SharedClock) -> DepositResult<()> {
        self.inner.ensure_not_configured("Clock")?;
        self.inner.clock.write_with(|it| *it = clock);
        Ok(())
    }

    /// Backing store of the flat adapter, an in-memory store when unset.
    pub fn key_value_store(&self) -> Option<KeyValueStore> {
        self.inner.key_value_store.read_with(|it| it.clone())
    }

    pub fn set_key_value_store(&self, store: KeyValueStore) -> DepositResult<()> {
        self.inner.ensure_not_configured("Key-value store")?;
        self.inner.key_value_store.write_with(|it| *it = Some(store));
        Ok(())
    }

    /// Factory of the indexed adapter, the process-wide one when unset.
    pub fn indexed_factory(&self) -> Option<IndexedFactory> {
        self.inner.indexed_factory.read_with(|it| it.clone())
    }

    pub fn set_indexed_factory(&self, factory: IndexedFactory) -> DepositResult<()> {
        self.inner.ensure_not_configured("Indexed factory")?;
        self.inner.indexed_factory.write_with(|it| *it = Some(factory));
        Ok(())
    }

    pub fn migration(&self) -> Option<MigrationFn> {
        self.inner.migration.read_with(|it| it.clone())
    }

    pub fn set_migration(&self, migration: MigrationFn) -> DepositResult<()> {
        self.inner.ensure_not_configured("Migration")?;
        self.inner.migration.write_with(|it| *it = Some(migration));
        Ok(())
    }

    /// Number of memoized results each query builder keeps, 0 disables memoization.
    pub fn memo_capacity(&self) -> usize {
        self.inner.memo_capacity.load(Ordering::Relaxed)
    }

    pub fn set_memo_capacity(&self, capacity: usize) -> DepositResult<()> {
        self.inner.ensure_not_configured("Memo capacity")?;
        self.inner.memo_capacity.store(capacity, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.inner.configured.load(Ordering::Relaxed)
    }

    /// Validates the configuration and freezes it.
    pub(crate) fn configure(&self) -> DepositResult<()> {
        if self.inner.configured.load(Ordering::Relaxed) {
            return Ok(());
        }

        let schema = self.schema();
        if schema.is_empty() {
            log::error!("Schema declares no tables");
            return Err(DepositError::new(
                "Schema declares no tables",
                ErrorKind::ConfigurationError,
            ));
        }
        schema.validate()?;

        self.inner.configured.store(true, Ordering::Relaxed);
        Ok(())
    }
}

struct DepositConfigInner {
    configured: AtomicBool,
    namespace: Atomic<String>,
    schema_version: AtomicU32,
    schema: Atomic<Schema>,
    adapter_kind: Atomic<AdapterKind>,
    clock: Atomic<SharedClock>,
    key_value_store: Atomic<Option<KeyValueStore>>,
    indexed_factory: Atomic<Option<IndexedFactory>>,
    migration: Atomic<Option<MigrationFn>>,
    memo_capacity: AtomicUsize,
}

impl DepositConfigInner {
    fn new() -> Self {
        DepositConfigInner {
            configured: AtomicBool::new(false),
            namespace: atomic(DEFAULT_NAMESPACE.to_string()),
            schema_version: AtomicU32::new(INITIAL_SCHEMA_VERSION),
            schema: atomic(Schema::new()),
            adapter_kind: atomic(AdapterKind::default()),
            clock: atomic(system_clock()),
            key_value_store: atomic(None),
            indexed_factory: atomic(None),
            migration: atomic(None),
            memo_capacity: AtomicUsize::new(DEFAULT_MEMO_CAPACITY),
        }
    }

    fn ensure_not_configured(&self, setting: &str) -> DepositResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after initialization", setting);
            return Err(DepositError::new(
                &format!("{} cannot be changed after initialization", setting),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
