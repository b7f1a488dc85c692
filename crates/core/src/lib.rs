//! Core types and traits for txlocker
//!
//! This crate defines the foundational types used throughout the workspace:
//! - Error: the single error type and `Result` alias
//! - Value / Row: SQL argument and result model
//! - Traits: the driver surface (Queryer, Pool, Transaction, Rows, Statement)
//! - Context: request context with cancellation, deadline and scope
//! - TxScope: explicit per-request keyed store and owner registry

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod row;
pub mod scope;
pub mod traits;
pub mod value;

// Re-export commonly used types and traits
pub use context::Context;
pub use error::{BoxError, Error, Result};
pub use row::{ExecResult, Row};
pub use scope::{ScopeId, ScopeKey, ScopeValue, TxScope};
pub use traits::{IsolationLevel, Pool, Queryer, Rows, Statement, Transaction, TxOptions, TxOwner};
pub use value::{FromValue, Value};
