use crate::common::RecordKey;
use crate::errors::DepositResult;
use crate::schema::Schema;
use serde_json::Value;
use std::time::Duration;

/// The uniform CRUD contract implemented by every backend.
///
/// Read paths (`get`, `get_all`, `count`) never fail because of expired or corrupted
/// entries; those are dropped from the result and purged. Write paths fail immediately
/// for programmer errors (undeclared table, record without its primary key) and report
/// backend failures with the original cause attached.
///
/// Every operation connects lazily, so calling [`StorageAdapter::connect`] up front is
/// optional.
pub trait StorageAdapter: Send + Sync {
    /// Performs the backend handshake. Idempotent.
    fn connect(&self) -> DepositResult<()>;

    /// Checks whether the handshake has completed.
    fn is_connected(&self) -> bool;

    /// Returns the validated schema this adapter was built with.
    fn schema(&self) -> &Schema;

    /// Reads one record, `None` if absent or expired.
    fn get(&self, table: &str, key: &RecordKey) -> DepositResult<Option<Value>>;

    /// Reads every live record of a table.
    fn get_all(&self, table: &str) -> DepositResult<Vec<Value>>;

    /// Writes a record, replacing any record with the same primary key.
    ///
    /// With a `ttl`, the entry expires at `now + ttl`.
    fn put(&self, table: &str, record: Value, ttl: Option<Duration>) -> DepositResult<()>;

    /// Removes one record. Removing an absent key is not an error.
    fn delete(&self, table: &str, key: &RecordKey) -> DepositResult<()>;

    /// Removes every record of a table.
    fn clear(&self, table: &str) -> DepositResult<()>;

    /// Number of live records, i.e. `get_all(table).len()`.
    fn count(&self, table: &str) -> DepositResult<usize> {
        Ok(self.get_all(table)?.len())
    }

    /// Writes many records. Not atomic unless the backend says otherwise.
    fn bulk_put(&self, table: &str, records: Vec<Value>, ttl: Option<Duration>)
        -> DepositResult<()>;

    /// Removes many records. Not atomic unless the backend says otherwise.
    fn bulk_delete(&self, table: &str, keys: &[RecordKey]) -> DepositResult<()>;

    /// Releases the backend. Later operations fail with `StoreAlreadyClosed`.
    fn close(&self) -> DepositResult<()>;

    /// Checks whether [`StorageAdapter::close`] has been called.
    fn is_closed(&self) -> bool;
}
