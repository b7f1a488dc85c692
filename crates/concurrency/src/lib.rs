//! Concurrency layer for txlocker
//!
//! This crate implements the context-scoped transaction locker:
//! - Locker: per-call decision between pool, lineage transaction and fallback lock
//! - Handle: tagged Queryer variant carrying its release obligation
//! - BoundTx: the transaction-bound instance shared by one context lineage
//! - LockerMetrics: how acquisitions were routed

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bound;
pub mod handle;
pub mod locker;
pub mod metrics;

pub use bound::{BoundTx, TxGuard};
pub use handle::{Began, Handle, HandleKind};
pub use locker::Locker;
pub use metrics::LockerMetrics;
