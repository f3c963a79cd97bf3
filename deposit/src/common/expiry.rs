use crate::common::{duration_millis, EXPIRES_AT};
use crate::errors::{DepositError, DepositResult, ErrorKind};
use serde_json::Value;
use std::time::Duration;

/// On-backend representation of a record: the record plus its optional expiry marker.
///
/// The marker is persisted inline as the reserved `expiresAt` field (epoch milliseconds)
/// of the stored object, so both backends and the flat layout share one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub record: Value,
    pub expires_at: Option<i64>,
}

impl StoredEntry {
    pub fn new(record: Value, expires_at: Option<i64>) -> Self {
        StoredEntry { record, expires_at }
    }

    /// Splits a stored object into record and marker.
    ///
    /// A non-object value is corrupted and yields [`ErrorKind::InvalidRecord`].
    pub fn unwrap(stored: Value) -> DepositResult<StoredEntry> {
        match stored {
            Value::Object(mut map) => {
                let expires_at = match map.remove(EXPIRES_AT) {
                    Some(marker) => marker.as_i64(),
                    None => None,
                };
                Ok(StoredEntry::new(Value::Object(map), expires_at))
            }
            other => Err(DepositError::new(
                &format!("Stored entry is not an object: {}", other),
                ErrorKind::InvalidRecord,
            )),
        }
    }

    /// Merges the marker back into the record for storage.
    pub fn wrap(self) -> DepositResult<Value> {
        match self.record {
            Value::Object(mut map) => {
                match self.expires_at {
                    Some(marker) => {
                        map.insert(EXPIRES_AT.to_string(), Value::from(marker));
                    }
                    None => {
                        map.remove(EXPIRES_AT);
                    }
                }
                Ok(Value::Object(map))
            }
            other => Err(DepositError::new(
                &format!("Record is not an object: {}", other),
                ErrorKind::InvalidRecord,
            )),
        }
    }

    /// Parses a raw JSON string as written by the flat adapter.
    pub fn decode(raw: &str) -> DepositResult<StoredEntry> {
        let value: Value = serde_json::from_str(raw)?;
        StoredEntry::unwrap(value)
    }

    pub fn encode(self) -> DepositResult<String> {
        let value = self.wrap()?;
        Ok(serde_json::to_string(&value)?)
    }

    #[inline]
    pub fn is_expired(&self, now_millis: i64) -> bool {
        is_expired(self.expires_at, now_millis)
    }
}

/// An entry expires once `now >= expires_at`.
#[inline]
pub fn is_expired(expires_at: Option<i64>, now_millis: i64) -> bool {
    match expires_at {
        Some(marker) => now_millis >= marker,
        None => false,
    }
}

/// Computes the absolute expiry marker `now + ttl`.
#[inline]
pub fn expiry_marker(ttl: Option<Duration>, now_millis: i64) -> Option<i64> {
    ttl.map(|ttl| now_millis.saturating_add(duration_millis(ttl)))
}

/// Deep equality of two records, ignoring their expiry markers.
pub fn same_record(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            let left_len = left.len() - usize::from(left.contains_key(EXPIRES_AT));
            let right_len = right.len() - usize::from(right.contains_key(EXPIRES_AT));
            left_len == right_len
                && left
                    .iter()
                    .filter(|(k, _)| k.as_str() != EXPIRES_AT)
                    .all(|(k, v)| right.get(k) == Some(v))
        }
        _ => a == b,
    }
}
