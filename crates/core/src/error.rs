//! Error types for txlocker
//!
//! This module defines the single error type used throughout the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Errors fall into four groups:
//! - Scope errors: transaction semantics requested outside a transaction scope
//! - Driver errors: anything the underlying pool or transaction reported,
//!   carried verbatim
//! - Row-handler errors: a caller-supplied callback failed
//! - Context errors: the request context was cancelled or ran past its deadline

use std::io;
use thiserror::Error;

/// Boxed error produced by a driver or a caller callback
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias for txlocker operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for txlocker
#[derive(Debug, Error)]
pub enum Error {
    /// Transaction semantics were requested outside a transaction scope
    #[error("SQL BEGIN: no transaction context ({0})")]
    NoTransactionContext(String),

    /// Failure reported by the pool, a transaction, a statement or a row set
    #[error(transparent)]
    Driver(BoxError),

    /// A caller-supplied row handler failed
    #[error("row handler failed: {0}")]
    Handler(BoxError),

    /// The request context was cancelled
    #[error("context cancelled")]
    Cancelled,

    /// The request context deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// A single-row query produced no row
    #[error("no rows in result set")]
    NoRows,

    /// Column index out of range for a row
    #[error("column index {index} out of range ({columns} columns)")]
    ColumnIndex {
        /// Requested index
        index: usize,
        /// Number of columns in the row
        columns: usize,
    },

    /// Column name not present in a row
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// Value could not be converted to the requested Rust type
    #[error("wrong type: expected {expected}, got {actual}")]
    WrongType {
        /// Requested type
        expected: &'static str,
        /// Type of the stored value
        actual: &'static str,
    },

    /// Configuration is invalid
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// I/O error (config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Scope error for a begin attempt outside a transaction scope
    pub fn no_transaction_context(detail: impl Into<String>) -> Self {
        Error::NoTransactionContext(detail.into())
    }

    /// Wrap a driver failure
    pub fn driver<E: Into<BoxError>>(err: E) -> Self {
        Error::Driver(err.into())
    }

    /// Wrap a row-handler failure
    pub fn handler<E: Into<BoxError>>(err: E) -> Self {
        Error::Handler(err.into())
    }

    /// Invalid configuration
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// Check if this is a scope error
    pub fn is_scope_error(&self) -> bool {
        matches!(self, Error::NoTransactionContext(_))
    }

    /// Check if this error came from the driver
    pub fn is_driver_error(&self) -> bool {
        matches!(self, Error::Driver(_))
    }

    /// Check if this error came from the request context
    pub fn is_context_error(&self) -> bool {
        matches!(self, Error::Cancelled | Error::DeadlineExceeded)
    }

    /// Borrow the driver error as a concrete type
    pub fn downcast_driver_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Error::Driver(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}
