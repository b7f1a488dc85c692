//! Routing scenarios: plain contexts hit the pool, request contexts share
//! one transaction.

use crate::common::*;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn plain_context_executes_directly_on_pool() {
    let (pool, locker) = setup();
    let ctx = Context::background();

    let handle = locker.acquire(&ctx).unwrap();
    assert!(!handle.is_transaction());
    drop(handle);

    locker
        .execute(&ctx, "INSERT INTO events (kind) VALUES (?)", &[Value::from("login")])
        .unwrap();

    assert_eq!(
        pool.statements_on(Target::Pool),
        vec!["INSERT INTO events (kind) VALUES (?)"]
    );
    assert_eq!(pool.transactions_begun(), 0);
}

#[test]
fn derived_context_reuses_request_transaction() {
    let (pool, locker) = setup();
    let (_scope, ctx) = request();

    locker.execute(&ctx, "INSERT INTO orders VALUES (1)", &[]).unwrap();
    let first = locker.bound_tx(&ctx).unwrap();

    let derived = ctx.with_timeout(Duration::from_secs(5));
    locker.execute(&derived, "INSERT INTO order_lines VALUES (1, 1)", &[]).unwrap();
    let second = locker.bound_tx(&derived).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(pool.transactions_begun(), 1);
    assert_eq!(
        pool.statements_on(Target::Tx(1)),
        vec![
            "BEGIN",
            "INSERT INTO orders VALUES (1)",
            "INSERT INTO order_lines VALUES (1, 1)"
        ]
    );
}

#[test]
fn begin_tx_outside_request_names_missing_context() {
    let (pool, locker) = setup();

    let result = locker.begin_tx(&Context::background(), &TxOptions::default());
    let err = result.unwrap_err();
    assert!(err.to_string().contains("no transaction context"));
    assert!(err.is_scope_error());
    assert_eq!(pool.transactions_begun(), 0);
}

#[test]
fn concurrent_requests_each_get_their_own_transaction() {
    let (pool, locker) = setup();
    pool.set_exec_delay(Duration::from_millis(2));
    let requests = 4;
    let calls_per_request = 3;
    let barrier = Arc::new(Barrier::new(requests * calls_per_request));

    let mut handles = Vec::new();
    for r in 0..requests {
        let (_scope, ctx) = request();
        for _ in 0..calls_per_request {
            let locker = locker.clone();
            let ctx = ctx.child();
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                locker.execute(&ctx, "INSERT INTO log VALUES (?)", &[Value::from(r as i64)])
            }));
        }
    }
    for h in handles {
        h.join().unwrap().unwrap();
    }

    assert_eq!(pool.transactions_begun(), requests);
    for probe in pool.transactions() {
        assert_eq!(probe.statement_count(), calls_per_request);
        assert_eq!(probe.max_concurrency(), 1);
    }
    let m = locker.metrics();
    assert_eq!(m.transactions_begun, requests as u64);
    assert_eq!(m.total_acquisitions(), (requests * calls_per_request) as u64);
}

#[test]
fn foreign_marker_falls_back_to_serialized_pool() {
    let (pool, locker) = setup();
    let (scope, ctx) = request();
    scope.set_value(locker.scope_key(), Arc::new(String::from("set elsewhere")));

    locker.execute(&ctx, "UPDATE t SET x = 1", &[]).unwrap();
    assert_eq!(pool.statements_on(Target::Pool), vec!["UPDATE t SET x = 1"]);
    assert!(locker.bound_tx(&ctx).is_none());
    assert_eq!(locker.metrics().serialized_acquisitions, 1);
}
