use crate::config::FjallConfig;
use crate::store::FjallKeyValueStore;
use deposit::errors::DepositResult;
use fjall::CompressionType;

/// Fluent builder for a [`FjallKeyValueStore`].
pub struct FjallStoreBuilder {
    store_config: FjallConfig,
}

impl FjallStoreBuilder {
    pub fn new() -> FjallStoreBuilder {
        FjallStoreBuilder {
            store_config: FjallConfig::new(),
        }
    }

    /// Syncs the journal after every write and keeps a 64 MB cache.
    ///
    /// ```rust,ignore
    /// let store = FjallKeyValueStore::with_config()
    ///     .durable_preset()
    ///     .db_path("/path/to/db")
    ///     .build()?;
    /// ```
    pub fn durable_preset(self) -> Self {
        self.cache_size(64 * 1024 * 1024)
            .bloom_filter_bits(10)
            .compression_type(CompressionType::Lz4)
            .sync_on_write(true)
    }

    /// Small cache, for embedded or memory-constrained hosts.
    pub fn low_memory_preset(self) -> Self {
        self.cache_size(8 * 1024 * 1024).bloom_filter_bits(10)
    }

    pub fn db_path(self, db_path: &str) -> Self {
        self.store_config.set_db_path(db_path);
        self
    }

    /// Partition holding the entries. Stores on the same path with different
    /// partitions do not see each other's entries.
    pub fn partition_name(self, name: &str) -> Self {
        self.store_config.set_partition_name(name);
        self
    }

    pub fn sync_on_write(self, sync: bool) -> Self {
        self.store_config.set_sync_on_write(sync);
        self
    }

    pub fn cache_size(self, bytes: u64) -> Self {
        self.store_config.set_cache_size(bytes);
        self
    }

    /// Bits per key, `0` disables bloom filters.
    pub fn bloom_filter_bits(self, bits: u8) -> Self {
        let bits = if bits == 0 { -1 } else { bits.min(i8::MAX as u8) as i8 };
        self.store_config.set_bloom_filter_bits(bits);
        self
    }

    pub fn compression_type(self, compression: CompressionType) -> Self {
        self.store_config.set_compression_type(compression);
        self
    }

    /// Opens the store. Fails if no path is set or the keyspace cannot be opened.
    pub fn build(self) -> DepositResult<FjallKeyValueStore> {
        FjallKeyValueStore::open(self.store_config)
    }
}

impl Default for FjallStoreBuilder {
    fn default() -> Self {
        FjallStoreBuilder::new()
    }
}
