//! Driver traits
//!
//! This module defines the SQL access surface the locker sits in front of.
//! Pools, transactions, prepared statements and row sets are supplied by a
//! driver; txlocker only routes calls to them.
//!
//! Thread safety: a [`Pool`] is shared between threads and must be safe for
//! concurrent use. A [`Transaction`] is only ever used by one caller at a
//! time, so it needs to be `Send` but not `Sync`.

use crate::context::Context;
use crate::error::Result;
use crate::row::{ExecResult, Row};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Minimal query capability shared by pools and transactions
pub trait Queryer {
    /// Prepare a statement for repeated execution
    ///
    /// A statement prepared on a transaction is only valid while that
    /// transaction is open.
    fn prepare(&self, ctx: &Context, query: &str) -> Result<Box<dyn Statement>>;

    /// Execute a statement that returns no rows
    fn execute(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<ExecResult>;

    /// Run a query returning any number of rows
    ///
    /// The returned row set must be closed by the caller.
    fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<Box<dyn Rows>>;

    /// Run a query expected to return one row
    ///
    /// # Errors
    ///
    /// Returns `Error::NoRows` when the result is empty.
    fn query_row(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<Row>;
}

/// Prepared statement
pub trait Statement: Send {
    /// Execute with arguments, returning no rows
    fn execute(&self, ctx: &Context, args: &[Value]) -> Result<ExecResult>;

    /// Query with arguments
    fn query(&self, ctx: &Context, args: &[Value]) -> Result<Box<dyn Rows>>;

    /// Release the statement
    fn close(&self) -> Result<()>;
}

/// Multi-row result set
pub trait Rows {
    /// Column names of the result
    fn columns(&self) -> &[String];

    /// Advance to the next row; `None` once exhausted
    fn next_row(&mut self) -> Result<Option<Row>>;

    /// Release the result set. Idempotent.
    fn close(&mut self) -> Result<()>;
}

/// An open database transaction
pub trait Transaction: Queryer + Send + 'static {
    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Fails with a driver error if the transaction is already finished.
    fn commit(&self) -> Result<()>;

    /// Roll the transaction back
    ///
    /// # Errors
    ///
    /// Fails with a driver error if the transaction is already finished.
    fn rollback(&self) -> Result<()>;
}

/// Shared connection pool
pub trait Pool: Queryer + Send + Sync + 'static {
    /// Transaction type produced by [`Pool::begin`]
    type Tx: Transaction;

    /// Begin a transaction
    fn begin(&self, ctx: &Context, opts: &TxOptions) -> Result<Self::Tx>;

    /// Close the pool. No further operations are valid afterward.
    fn close(&self) -> Result<()>;
}

/// Something registered with a transaction scope that must be finished
/// when the request completes
pub trait TxOwner: Send + Sync {
    /// Commit the owned transaction
    fn commit(&self) -> Result<()>;

    /// Roll back the owned transaction
    fn rollback(&self) -> Result<()>;
}

/// Transaction isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Dirty reads allowed
    ReadUncommitted,
    /// Only committed data is visible
    ReadCommitted,
    /// Rows read once stay stable
    RepeatableRead,
    /// Full serializability
    Serializable,
}

/// Options for beginning a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOptions {
    /// Isolation level; `None` uses the driver default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolation: Option<IsolationLevel>,
    /// Begin a read-only transaction
    #[serde(default)]
    pub read_only: bool,
}

impl TxOptions {
    /// Options with the driver defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the isolation level
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    /// Request a read-only transaction
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}
