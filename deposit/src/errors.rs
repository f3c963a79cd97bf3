use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for Deposit operations.
///
/// Each kind names one category of failure so that callers can branch on it,
/// for example to decide whether a failed transaction is worth retrying.
///
/// # Examples
///
/// ```rust,ignore
/// use deposit::errors::{DepositError, ErrorKind, DepositResult};
///
/// fn example() -> DepositResult<()> {
///     Err(DepositError::new("Table users is not declared", ErrorKind::TableNotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Schema and configuration errors, raised before any I/O
    /// The declared schema or builder configuration is invalid
    ConfigurationError,
    /// The table is not declared in the schema or does not exist in the store
    TableNotFound,

    // Record errors, raised on write before touching the backend
    /// A record lacks its declared primary-key field
    MissingPrimaryKey,
    /// A primary-key value is not a number or a string
    InvalidKey,
    /// A record is not a structured object
    InvalidRecord,
    /// Error encoding or decoding a stored value
    EncodingError,

    // Backend and store errors
    /// Error from the storage backend
    BackendError,
    /// Store has not been initialized
    StoreNotInitialized,
    /// Store has already been closed
    StoreAlreadyClosed,
    /// A database was requested at a lower version than the stored one
    VersionError,
    /// A migration function failed during an upgrade
    MigrationError,
    /// Failed to create or maintain a secondary index
    IndexingError,

    // Transaction errors
    /// The user callback of a native transaction returned an error
    TransactionCallbackFailed,
    /// The native transaction was aborted by the backend for a reason unrelated to the callback
    TransactionAborted,
    /// The optimistic (non-atomic) transaction failed, some writes may have been applied
    TransactionFailed,

    // Generic errors
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Generic IO error
    IOError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConfigurationError => write!(f, "Configuration error"),
            ErrorKind::TableNotFound => write!(f, "Table not found"),
            ErrorKind::MissingPrimaryKey => write!(f, "Missing primary key"),
            ErrorKind::InvalidKey => write!(f, "Invalid key"),
            ErrorKind::InvalidRecord => write!(f, "Invalid record"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::StoreNotInitialized => write!(f, "Store not initialized"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::VersionError => write!(f, "Version error"),
            ErrorKind::MigrationError => write!(f, "Migration error"),
            ErrorKind::IndexingError => write!(f, "Indexing error"),
            ErrorKind::TransactionCallbackFailed => write!(f, "Transaction callback failed"),
            ErrorKind::TransactionAborted => write!(f, "Transaction aborted"),
            ErrorKind::TransactionFailed => write!(f, "Transaction failed"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom Deposit error type.
///
/// `DepositError` carries a message, a kind and an optional cause. Errors that wrap
/// another failure (a transaction callback error, a backend abort) keep the original
/// error as their cause so it can be inspected with [`DepositError::cause`].
///
/// # Examples
///
/// ```rust,ignore
/// use deposit::errors::{DepositError, ErrorKind};
///
/// let cause = DepositError::new("disk unavailable", ErrorKind::IOError);
/// let err = DepositError::new_with_cause(
///     "transaction aborted for tables [accounts]",
///     ErrorKind::TransactionAborted,
///     cause,
/// );
/// assert_eq!(err.kind(), &ErrorKind::TransactionAborted);
/// ```
#[derive(Clone)]
pub struct DepositError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DepositError>>,
    backtrace: Atomic<Backtrace>,
}

impl DepositError {
    /// Creates a new `DepositError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DepositError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    /// Creates a new `DepositError` that wraps `cause`.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DepositError) -> Self {
        DepositError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DepositError> {
        self.cause.as_deref()
    }

    /// Returns the innermost error of the cause chain.
    pub fn root_cause(&self) -> &DepositError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl Display for DepositError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DepositError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => {
                let mut backtrace = self.backtrace.write();
                backtrace.resolve();
                write!(f, "{}\n{:?}", self.message, *backtrace)
            }
        }
    }
}

impl Error for DepositError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Deposit operations.
pub type DepositResult<T> = Result<T, DepositError>;

impl From<serde_json::Error> for DepositError {
    fn from(err: serde_json::Error) -> Self {
        DepositError::new(&format!("JSON error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<std::io::Error> for DepositError {
    fn from(err: std::io::Error) -> Self {
        DepositError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<std::string::FromUtf8Error> for DepositError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DepositError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}
