use crate::common::RecordKey;
use crate::deposit_config::DepositConfig;
use crate::errors::{DepositError, DepositResult, ErrorKind};
use crate::schema::Schema;
use crate::store::flat::{FlatAdapter, InMemoryKeyValueStore};
use crate::store::indexed::{IndexedAdapter, IndexedFactory};
use crate::store::{KeyValueStore, StorageAdapter};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// Which backend a [`crate::deposit::Deposit`] runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Flat,
    #[default]
    Indexed,
}

impl Display for AdapterKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterKind::Flat => write!(f, "flat"),
            AdapterKind::Indexed => write!(f, "indexed"),
        }
    }
}

impl FromStr for AdapterKind {
    type Err = DepositError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(AdapterKind::Flat),
            "indexed" => Ok(AdapterKind::Indexed),
            other => Err(DepositError::new(
                &format!("Unknown adapter kind {}, expected flat or indexed", other),
                ErrorKind::ConfigurationError,
            )),
        }
    }
}

/// The closed set of storage adapters.
///
/// Every [`StorageAdapter`] call is forwarded to the wrapped adapter. Backend specific
/// capabilities are reached through [`Adapter::as_indexed`] and [`Adapter::as_flat`].
#[derive(Clone)]
pub enum Adapter {
    Flat(FlatAdapter),
    Indexed(IndexedAdapter),
}

impl Adapter {
    /// Builds the adapter selected by `config`.
    ///
    /// The flat adapter falls back to a fresh [`InMemoryKeyValueStore`] and the indexed
    /// adapter to [`IndexedFactory::global`] when none is configured.
    pub fn from_config(config: &DepositConfig) -> DepositResult<Adapter> {
        let schema = config.schema();
        match config.adapter_kind() {
            AdapterKind::Flat => {
                if config.migration().is_some() {
                    log::warn!("Migrations only run on the indexed adapter, ignoring it");
                }
                let store = config
                    .key_value_store()
                    .unwrap_or_else(|| KeyValueStore::new(InMemoryKeyValueStore::new()));
                let adapter = FlatAdapter::new(
                    &config.namespace(),
                    config.schema_version(),
                    schema,
                    store,
                    config.clock(),
                )?;
                Ok(Adapter::Flat(adapter))
            }
            AdapterKind::Indexed => {
                if config.key_value_store().is_some() {
                    log::warn!("A key-value store only backs the flat adapter, ignoring it");
                }
                let factory = config
                    .indexed_factory()
                    .unwrap_or_else(IndexedFactory::global);
                let adapter = IndexedAdapter::new(
                    &config.namespace(),
                    config.schema_version(),
                    schema,
                    factory,
                    config.clock(),
                    config.migration(),
                )?;
                Ok(Adapter::Indexed(adapter))
            }
        }
    }

    pub fn kind(&self) -> AdapterKind {
        match self {
            Adapter::Flat(_) => AdapterKind::Flat,
            Adapter::Indexed(_) => AdapterKind::Indexed,
        }
    }

    pub fn as_flat(&self) -> Option<&FlatAdapter> {
        match self {
            Adapter::Flat(adapter) => Some(adapter),
            Adapter::Indexed(_) => None,
        }
    }

    pub fn as_indexed(&self) -> Option<&IndexedAdapter> {
        match self {
            Adapter::Indexed(adapter) => Some(adapter),
            Adapter::Flat(_) => None,
        }
    }

    /// Whether multi-table transactions on this adapter are atomic.
    pub fn supports_atomic_transactions(&self) -> bool {
        matches!(self, Adapter::Indexed(_))
    }

    fn delegate(&self) -> &dyn StorageAdapter {
        match self {
            Adapter::Flat(adapter) => adapter,
            Adapter::Indexed(adapter) => adapter,
        }
    }
}

impl From<FlatAdapter> for Adapter {
    fn from(adapter: FlatAdapter) -> Self {
        Adapter::Flat(adapter)
    }
}

impl From<IndexedAdapter> for Adapter {
    fn from(adapter: IndexedAdapter) -> Self {
        Adapter::Indexed(adapter)
    }
}

impl StorageAdapter for Adapter {
    fn connect(&self) -> DepositResult<()> {
        self.delegate().connect()
    }

    fn is_connected(&self) -> bool {
        self.delegate().is_connected()
    }

    fn schema(&self) -> &Schema {
        self.delegate().schema()
    }

    fn get(&self, table: &str, key: &RecordKey) -> DepositResult<Option<Value>> {
        self.delegate().get(table, key)
    }

    fn get_all(&self, table: &str) -> DepositResult<Vec<Value>> {
        self.delegate().get_all(table)
    }

    fn put(&self, table: &str, record: Value, ttl: Option<Duration>) -> DepositResult<()> {
        self.delegate().put(table, record, ttl)
    }

    fn delete(&self, table: &str, key: &RecordKey) -> DepositResult<()> {
        self.delegate().delete(table, key)
    }

    fn clear(&self, table: &str) -> DepositResult<()> {
        self.delegate().clear(table)
    }

    fn count(&self, table: &str) -> DepositResult<usize> {
        self.delegate().count(table)
    }

    fn bulk_put(
        &self,
        table: &str,
        records: Vec<Value>,
        ttl: Option<Duration>,
    ) -> DepositResult<()> {
        self.delegate().bulk_put(table, records, ttl)
    }

    fn bulk_delete(&self, table: &str, keys: &[RecordKey]) -> DepositResult<()> {
        self.delegate().bulk_delete(table, keys)
    }

    fn close(&self) -> DepositResult<()> {
        self.delegate().close()
    }

    fn is_closed(&self) -> bool {
        self.delegate().is_closed()
    }
}
