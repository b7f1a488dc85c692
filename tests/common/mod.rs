//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::{Arc, Once};

pub use txlocker::{
    open, Context, Error, Locker, LockerConfig, Queryer, StatementExecutor, TxOptions, TxScope,
    Value,
};
pub use txlocker_testkit::{MemError, MemPool, Target, TxState};

static INIT_TRACING: Once = Once::new();

/// Install a test subscriber once; set `RUST_LOG`-style output with `--nocapture`
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .try_init();
    });
}

/// Fresh pool plus a locker over it
pub fn setup() -> (MemPool, Locker<MemPool>) {
    init_tracing();
    let pool = MemPool::new();
    let locker = open(pool.clone(), &LockerConfig::default()).expect("default config is valid");
    (pool, locker)
}

/// A new request: scope plus the root context of its lineage
pub fn request() -> (Arc<TxScope>, Context) {
    let scope = TxScope::new();
    let ctx = Context::background().with_tx_scope(Arc::clone(&scope));
    (scope, ctx)
}

/// Script `n` integer rows under column `n`, valued 1..=n
pub fn script_numbers(pool: &MemPool, sql: &str, n: i64) {
    pool.script_rows(sql, &["n"], (1..=n).map(|i| vec![Value::Int(i)]).collect());
}
