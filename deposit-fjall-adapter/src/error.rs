use deposit::errors::{DepositError, ErrorKind};
use thiserror::Error;

/// Failures raised by the fjall-backed key-value store.
#[derive(Error, Debug)]
pub enum FjallStoreError {
    #[error("Failed to open keyspace at {path}: {source}")]
    Open { path: String, source: fjall::Error },
    #[error("Failed to open partition {name}: {source}")]
    Partition { name: String, source: fjall::Error },
    #[error("Failed to {operation} key {key}: {source}")]
    Operation {
        operation: &'static str,
        key: String,
        source: fjall::Error,
    },
    #[error("Failed to persist keyspace: {0}")]
    Persist(fjall::Error),
    #[error("Stored bytes for key {0} are not valid UTF-8")]
    InvalidUtf8(String),
    #[error("Database path is not configured")]
    MissingPath,
}

impl From<FjallStoreError> for DepositError {
    fn from(err: FjallStoreError) -> Self {
        let kind = match err {
            FjallStoreError::MissingPath => ErrorKind::ConfigurationError,
            FjallStoreError::InvalidUtf8(_) => ErrorKind::EncodingError,
            _ => ErrorKind::BackendError,
        };
        DepositError::new(&err.to_string(), kind)
    }
}
