//! Error types for sqltap

use thiserror::Error;

/// Result type alias for sqltap operations
pub type TapResult<T> = Result<T, TapError>;

/// Error types for instrumented database operations.
///
/// Errors raised by a wrapped resource travel through the instrumentation
/// layer as the same value the delegate produced: the failure is recorded
/// and dispatched to listeners, then returned to the caller untouched.
#[derive(Debug, Error)]
pub enum TapError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Db(#[from] tokio_postgres::Error),

    /// Resource already closed or consumed
    #[error("Closed: {0}")]
    Closed(String),

    /// Operation not supported by this backend
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Invalid bind or column index
    #[error("Invalid index: {0}")]
    InvalidIndex(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl TapError {
    /// Create a closed-resource error
    pub fn closed(message: impl Into<String>) -> Self {
        Self::Closed(message.into())
    }

    /// Create an unsupported-operation error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Create an invalid-index error
    pub fn invalid_index(message: impl Into<String>) -> Self {
        Self::InvalidIndex(message.into())
    }

    /// Check if this is a closed-resource error
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }

    /// Wrap a tokio_postgres error, surfacing connection failures distinctly
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::Db(err)
    }
}
