//! txlocker - context-scoped SQL transaction locking
//!
//! Calls that share a request context share one transaction and take turns
//! on it; calls without a transaction scope go straight to the pool.
//!
//! # Quick Start
//!
//! ```ignore
//! use txlocker::{open, Context, LockerConfig, StatementExecutor, TxScope, Value};
//!
//! let locker = open(pool, &LockerConfig::default())?;
//!
//! // One scope per request
//! let scope = TxScope::new();
//! let ctx = Context::background().with_tx_scope(scope.clone());
//!
//! locker.execute(&ctx, "INSERT INTO audit (who) VALUES (?)", &[Value::from("ada")])?;
//! locker.query_many(&ctx, |row| { /* ... */ Ok(()) }, "SELECT * FROM audit", &[])?;
//!
//! scope.commit()?;
//! ```
//!
//! # Architecture
//!
//! - `txlocker-core`: driver traits, values, errors, `Context`, `TxScope`
//! - `txlocker-concurrency`: the [`Locker`] and its handles
//! - `txlocker-engine`: [`StatementExecutor`], `txlocker.toml`, [`open`]

pub use txlocker_concurrency::{Began, BoundTx, Handle, HandleKind, Locker, LockerMetrics, TxGuard};
pub use txlocker_core::{
    BoxError, Context, Error, ExecResult, FromValue, IsolationLevel, Pool, Queryer, Result, Row,
    Rows, ScopeId, ScopeKey, ScopeValue, Statement, Transaction, TxOptions, TxOwner, TxScope, Value,
};
pub use txlocker_engine::{
    open, open_with_config_file, LockerConfig, StatementExecutor, CONFIG_FILE_NAME,
};
