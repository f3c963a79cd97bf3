//! Storage adapters and backends.
//!
//! Every backend implements [`StorageAdapter`], the uniform CRUD contract used by the
//! [`crate::deposit::Deposit`] facade and the query builder. The set of adapters is
//! sealed in the [`Adapter`] enum and selected by an explicit [`AdapterKind`]:
//!
//! - **Flat**: [`flat::FlatAdapter`] keeps one string entry per record in a sorted
//!   key-value namespace ([`KeyValueStore`]). It has no native transactions; bulk and
//!   multi-table writes are independent per-record operations.
//! - **Indexed**: [`indexed::IndexedAdapter`] runs on a versioned transactional database
//!   with secondary indexes, schema upgrades and atomic multi-table transactions.
//!
//! Both adapters share the same read policy: expired and corrupted entries are treated
//! as absent, logged, and purged as a side effect of the read that found them.

mod adapter;
pub mod flat;
pub mod indexed;
mod key_value_store;
mod storage_adapter;

pub use adapter::*;
pub use key_value_store::*;
pub use storage_adapter::*;
