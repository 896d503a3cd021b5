//! Pool and connection error types.

use mssql_connstr::ParseErrors;
use thiserror::Error;

/// A diagnostic reported by the native driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{sqlstate}] {message}")]
pub struct NativeError {
    /// Five-character SQLSTATE code.
    pub sqlstate: String,
    /// Driver message text.
    pub message: String,
}

impl NativeError {
    /// Create a native error.
    pub fn new(sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sqlstate: sqlstate.into(),
            message: message.into(),
        }
    }

    /// Whether the SQLSTATE belongs to the connection exception class (`08xxx`).
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        self.sqlstate.starts_with("08")
    }
}

/// Errors raised by a single [`Connection`](crate::Connection).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    /// A native call failed.
    #[error("{operation} failed: {source}")]
    Native {
        /// The native operation that failed.
        operation: &'static str,
        /// Diagnostic from the driver.
        #[source]
        source: NativeError,
    },

    /// The operation needs an open connection.
    #[error("connection is not open")]
    NotConnected,

    /// `connect` was called on an open connection.
    #[error("connection is already open")]
    AlreadyConnected,
}

impl ConnectionError {
    pub(crate) fn native(operation: &'static str) -> impl FnOnce(NativeError) -> Self {
        move |source| Self::Native { operation, source }
    }
}

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Every slot is taken and no idle connection could be reused.
    #[error("connection pool exhausted: maximum of {max} connections reached")]
    Exhausted {
        /// Maximum allowed connections.
        max: usize,
    },

    /// Pool is closed.
    #[error("pool is closed")]
    PoolClosed,

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),

    /// Opening a new connection failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The connection string was rejected.
    #[error(transparent)]
    ConnectionString(#[from] ParseErrors),
}

impl PoolError {
    /// Whether the caller may retry later with the same input.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Exhausted { .. } => true,
            Self::Connection(ConnectionError::Native { source, .. }) => {
                source.is_connection_failure()
            }
            _ => false,
        }
    }
}
