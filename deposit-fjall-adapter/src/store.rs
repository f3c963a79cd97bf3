use crate::builder::FjallStoreBuilder;
use crate::config::FjallConfig;
use crate::error::FjallStoreError;
use deposit::errors::DepositResult;
use deposit::store::KeyValueStoreProvider;
use fjall::{Keyspace, PartitionHandle, PersistMode, Slice};
use std::sync::Arc;

/// Persistent key-value store for the flat adapter, backed by one fjall partition.
///
/// Keys and values are stored as UTF-8 bytes. Fjall keeps keys in lexicographic byte
/// order, which matches the string order the flat adapter relies on for prefix scans.
///
/// # Examples
///
/// ```rust,ignore
/// use deposit::deposit::Deposit;
/// use deposit::store::AdapterKind;
/// use deposit_fjall_adapter::FjallKeyValueStore;
///
/// let store = FjallKeyValueStore::with_config()
///     .db_path("/var/lib/app/deposit")
///     .build()?;
///
/// let deposit = Deposit::builder()
///     .adapter_kind(AdapterKind::Flat)
///     .key_value_store(store)
///     .table("users", TableSchema::new("id"))
///     .open()?;
/// ```
#[derive(Clone)]
pub struct FjallKeyValueStore {
    inner: Arc<FjallStoreInner>,
}

impl FjallKeyValueStore {
    pub fn with_config() -> FjallStoreBuilder {
        FjallStoreBuilder::new()
    }

    /// Opens (or creates) the keyspace at the configured path.
    pub fn open(config: FjallConfig) -> DepositResult<FjallKeyValueStore> {
        let inner = FjallStoreInner::open(config)?;
        Ok(FjallKeyValueStore {
            inner: Arc::new(inner),
        })
    }

    pub fn config(&self) -> &FjallConfig {
        &self.inner.config
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.inner.keyspace
    }
}

impl KeyValueStoreProvider for FjallKeyValueStore {
    fn get_item(&self, key: &str) -> DepositResult<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> DepositResult<()> {
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> DepositResult<()> {
        self.inner.remove_item(key)
    }

    fn scan_prefix(&self, prefix: &str) -> DepositResult<Vec<(String, String)>> {
        self.inner.scan_prefix(prefix)
    }

    fn flush(&self) -> DepositResult<()> {
        self.inner.persist()
    }
}

struct FjallStoreInner {
    config: FjallConfig,
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl FjallStoreInner {
    fn open(config: FjallConfig) -> Result<FjallStoreInner, FjallStoreError> {
        let path = config.db_path();
        if path.is_empty() {
            log::error!("Fjall store opened without a database path");
            return Err(FjallStoreError::MissingPath);
        }

        let keyspace = Keyspace::open(config.keyspace_config()).map_err(|source| {
            log::error!("Failed to open keyspace at {}: {}", path, source);
            FjallStoreError::Open {
                path: path.clone(),
                source,
            }
        })?;

        let name = config.partition_name();
        let partition = keyspace
            .open_partition(&name, config.partition_config())
            .map_err(|source| {
                log::error!("Failed to open partition {}: {}", name, source);
                FjallStoreError::Partition {
                    name: name.clone(),
                    source,
                }
            })?;

        log::debug!("Opened fjall partition {} at {}", name, path);
        Ok(FjallStoreInner {
            config,
            keyspace,
            partition,
        })
    }

    fn get_item(&self, key: &str) -> DepositResult<Option<String>> {
        let value = self
            .partition
            .get(key)
            .map_err(|source| operation_error("read", key, source))?;
        match value {
            Some(bytes) => match decode(key, &bytes) {
                Ok(value) => Ok(Some(value)),
                Err(_) => {
                    self.purge_raw(key.as_bytes());
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> DepositResult<()> {
        self.partition
            .insert(key, value)
            .map_err(|source| operation_error("write", key, source))?;
        if self.config.sync_on_write() {
            self.persist()?;
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> DepositResult<()> {
        self.partition
            .remove(key)
            .map_err(|source| operation_error("remove", key, source))?;
        if self.config.sync_on_write() {
            self.persist()?;
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> DepositResult<Vec<(String, String)>> {
        let mut entries = Vec::new();
        for item in self.partition.prefix(prefix) {
            let (raw_key, raw_value) =
                item.map_err(|source| operation_error("scan", prefix, source))?;
            let decoded = decode(prefix, &raw_key)
                .and_then(|key| decode(&key, &raw_value).map(|value| (key, value)));
            match decoded {
                Ok(entry) => entries.push(entry),
                Err(_) => self.purge_raw(&raw_key),
            }
        }
        Ok(entries)
    }

    /// Removes an entry whose bytes cannot be decoded. Failures are only logged.
    fn purge_raw(&self, key: &[u8]) {
        let display = String::from_utf8_lossy(key);
        log::warn!("Purging undecodable entry {}", display);
        if let Err(err) = self.partition.remove(key) {
            log::warn!("Failed to purge entry {}: {}", display, err);
        }
    }

    fn persist(&self) -> DepositResult<()> {
        self.keyspace.persist(PersistMode::SyncAll).map_err(|err| {
            log::error!("Failed to persist keyspace: {}", err);
            FjallStoreError::Persist(err).into()
        })
    }
}

fn operation_error(operation: &'static str, key: &str, source: fjall::Error) -> FjallStoreError {
    log::error!("Failed to {} key {}: {}", operation, key, source);
    FjallStoreError::Operation {
        operation,
        key: key.to_string(),
        source,
    }
}

fn decode(key: &str, bytes: &Slice) -> Result<String, FjallStoreError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| {
            log::warn!("Stored bytes for key {} are not valid UTF-8", key);
            FjallStoreError::InvalidUtf8(key.to_string())
        })
}
