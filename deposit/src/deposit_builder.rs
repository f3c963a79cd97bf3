use crate::common::{Clock, SharedClock};
use crate::deposit::Deposit;
use crate::deposit_config::DepositConfig;
use crate::errors::{DepositError, DepositResult};
use crate::schema::{Schema, TableSchema};
use crate::store::indexed::{IndexedFactory, MigrationFn};
use crate::store::{AdapterKind, KeyValueStore, KeyValueStoreProvider};
use serde_json::Value;
use std::sync::Arc;

/// Fluent builder for [`Deposit`].
///
/// The first invalid setting is remembered and returned by [`DepositBuilder::open`];
/// later settings are ignored once an error has been recorded.
///
/// ```rust,ignore
/// let deposit = Deposit::builder()
///     .namespace("shop")
///     .schema_version(2)
///     .table("products", TableSchema::new("sku").index("category"))
///     .adapter_kind(AdapterKind::Indexed)
///     .open()?;
/// ```
#[derive(Default)]
pub struct DepositBuilder {
    error: Option<DepositError>,
    config: DepositConfig,
}

impl DepositBuilder {
    pub fn new() -> Self {
        DepositBuilder {
            error: None,
            config: DepositConfig::new(),
        }
    }

    fn apply(mut self, setting: impl FnOnce(&DepositConfig) -> DepositResult<()>) -> Self {
        if self.error.is_none() {
            if let Err(e) = setting(&self.config) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn namespace(self, namespace: &str) -> Self {
        self.apply(|config| config.set_namespace(namespace))
    }

    pub fn schema_version(self, version: u32) -> Self {
        self.apply(|config| config.set_schema_version(version))
    }

    pub fn schema(self, schema: Schema) -> Self {
        self.apply(|config| config.set_schema(schema))
    }

    /// Sets the schema from its declarative JSON form,
    /// `{"users": {"key": "id", "indexes": ["email"]}}`.
    pub fn schema_json(self, schema: Value) -> Self {
        self.apply(|config| config.set_schema(Schema::from_json(schema)?))
    }

    pub fn table(self, name: &str, table: TableSchema) -> Self {
        self.apply(|config| config.add_table(name, table))
    }

    pub fn adapter_kind(self, kind: AdapterKind) -> Self {
        self.apply(|config| config.set_adapter_kind(kind))
    }

    pub fn clock<C: Clock + 'static>(self, clock: C) -> Self {
        self.shared_clock(Arc::new(clock))
    }

    pub fn shared_clock(self, clock: SharedClock) -> Self {
        self.apply(|config| config.set_clock(clock))
    }

    /// Backs the flat adapter with `store`.
    pub fn key_value_store<S: KeyValueStoreProvider + 'static>(self, store: S) -> Self {
        self.shared_key_value_store(KeyValueStore::new(store))
    }

    pub fn shared_key_value_store(self, store: KeyValueStore) -> Self {
        self.apply(|config| config.set_key_value_store(store))
    }

    /// Opens indexed databases from `factory` instead of the process-wide one.
    pub fn indexed_factory(self, factory: IndexedFactory) -> Self {
        self.apply(|config| config.set_indexed_factory(factory))
    }

    pub fn migration(self, migration: MigrationFn) -> Self {
        self.apply(|config| config.set_migration(migration))
    }

    pub fn memo_capacity(self, capacity: usize) -> Self {
        self.apply(|config| config.set_memo_capacity(capacity))
    }

    /// Validates and freezes the configuration without opening anything.
    pub fn build_config(self) -> DepositResult<DepositConfig> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.config.configure()?;
        Ok(self.config)
    }

    /// Builds the adapter and the facade. The backend is connected lazily.
    pub fn open(self) -> DepositResult<Deposit> {
        let config = self.build_config()?;
        Deposit::open(config)
    }
}
