use fjall::{CompressionType, Config, PartitionCreateOptions};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI8, AtomicU64, Ordering};
use std::sync::Arc;

/// Partition used when none is configured.
pub const DEFAULT_PARTITION: &str = "deposit";

/// Fjall keyspace and partition settings for a [`FjallKeyValueStore`](crate::FjallKeyValueStore).
///
/// Clones share the same settings. Values are read once, when the store opens.
#[derive(Clone)]
pub struct FjallConfig {
    inner: Arc<FjallConfigInner>,
}

impl FjallConfig {
    /// Creates a configuration with a 32 MB cache, LZ4 compression, 10 bloom filter bits
    /// per key and no fsync after each write.
    pub fn new() -> FjallConfig {
        FjallConfig {
            inner: Arc::new(FjallConfigInner::new()),
        }
    }

    pub(crate) fn keyspace_config(&self) -> Config {
        Config::new(self.db_path()).cache_size(self.cache_size())
    }

    pub(crate) fn partition_config(&self) -> PartitionCreateOptions {
        let bits = self.bloom_filter_bits();
        PartitionCreateOptions::default()
            .bloom_filter_bits(if bits < 0 { None } else { Some(bits as u8) })
            .compression(self.compression_type())
    }

    pub fn db_path(&self) -> String {
        self.inner.db_path.read().clone()
    }

    pub(crate) fn set_db_path(&self, db_path: &str) {
        *self.inner.db_path.write() = db_path.to_string();
    }

    pub fn partition_name(&self) -> String {
        self.inner.partition_name.read().clone()
    }

    pub(crate) fn set_partition_name(&self, name: &str) {
        *self.inner.partition_name.write() = name.to_string();
    }

    /// Whether every write is followed by a full journal sync.
    pub fn sync_on_write(&self) -> bool {
        self.inner.sync_on_write.load(Ordering::Relaxed)
    }

    pub(crate) fn set_sync_on_write(&self, sync: bool) {
        self.inner.sync_on_write.store(sync, Ordering::Relaxed)
    }

    pub fn cache_size(&self) -> u64 {
        self.inner.cache_size.load(Ordering::Relaxed)
    }

    pub(crate) fn set_cache_size(&self, bytes: u64) {
        self.inner.cache_size.store(bytes, Ordering::Relaxed)
    }

    /// Bloom filter bits per key, or `-1` when bloom filters are disabled.
    pub fn bloom_filter_bits(&self) -> i8 {
        self.inner.bloom_filter_bits.load(Ordering::Relaxed)
    }

    pub(crate) fn set_bloom_filter_bits(&self, bits: i8) {
        self.inner.bloom_filter_bits.store(bits, Ordering::Relaxed)
    }

    pub fn compression_type(&self) -> CompressionType {
        *self.inner.compression_type.read()
    }

    pub(crate) fn set_compression_type(&self, compression: CompressionType) {
        *self.inner.compression_type.write() = compression;
    }
}

impl Default for FjallConfig {
    fn default() -> Self {
        FjallConfig::new()
    }
}

struct FjallConfigInner {
    db_path: RwLock<String>,
    partition_name: RwLock<String>,
    sync_on_write: AtomicBool,
    cache_size: AtomicU64,
    bloom_filter_bits: AtomicI8,
    compression_type: RwLock<CompressionType>,
}

impl FjallConfigInner {
    fn new() -> Self {
        FjallConfigInner {
            db_path: RwLock::new(String::new()),
            partition_name: RwLock::new(DEFAULT_PARTITION.to_string()),
            sync_on_write: AtomicBool::new(false),
            cache_size: AtomicU64::new(32 * 1024 * 1024),
            bloom_filter_bits: AtomicI8::new(10),
            compression_type: RwLock::new(CompressionType::Lz4),
        }
    }
}
