use crate::common::RecordKey;
use serde_json::Value;
use std::time::Duration;

/// One operation of a [`crate::deposit::Deposit::patch`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    Put {
        record: Value,
        ttl: Option<Duration>,
    },
    Delete {
        key: RecordKey,
    },
    Clear,
}

impl PatchOp {
    pub fn put(record: Value) -> Self {
        PatchOp::Put { record, ttl: None }
    }

    pub fn put_with_ttl(record: Value, ttl: Duration) -> Self {
        PatchOp::Put {
            record,
            ttl: Some(ttl),
        }
    }

    pub fn delete<K: Into<RecordKey>>(key: K) -> Self {
        PatchOp::Delete { key: key.into() }
    }

    pub fn clear() -> Self {
        PatchOp::Clear
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            PatchOp::Put { .. } => "put",
            PatchOp::Delete { .. } => "delete",
            PatchOp::Clear => "clear",
        }
    }
}
