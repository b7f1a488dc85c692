//! A request from first statement to commit or rollback.

use crate::common::*;

#[test]
fn request_commits_through_scope() {
    let (pool, locker) = setup();
    let (scope, ctx) = request();

    locker.execute(&ctx, "INSERT INTO a VALUES (1)", &[]).unwrap();
    locker.execute(&ctx.child(), "INSERT INTO b VALUES (1)", &[]).unwrap();
    scope.commit().unwrap();

    let tx = pool.tx(1).unwrap();
    assert_eq!(tx.state(), TxState::Committed);
    assert_eq!(scope.owner_count(), 0);
}

#[test]
fn handler_failure_lets_caller_roll_back() {
    let (pool, locker) = setup();
    script_numbers(&pool, "SELECT n FROM queue", 3);
    let (_scope, ctx) = request();

    locker.execute(&ctx, "UPDATE queue SET taken = 1", &[]).unwrap();
    let err = locker
        .query_many(
            &ctx,
            |row| match row.get::<i64>(0)? {
                2 => Err(Error::handler("poison message")),
                _ => Ok(()),
            },
            "SELECT n FROM queue",
            &[],
        )
        .unwrap_err();
    assert!(matches!(err, Error::Handler(_)));

    locker.rollback(&ctx).unwrap();
    assert_eq!(pool.tx(1).unwrap().state(), TxState::RolledBack);
    assert_eq!(pool.open_result_sets(), 0);
}

#[test]
fn statements_after_commit_surface_driver_error() {
    let (pool, locker) = setup();
    let (_scope, ctx) = request();

    locker.execute(&ctx, "INSERT INTO a VALUES (1)", &[]).unwrap();
    locker.commit(&ctx).unwrap();

    let err = locker.execute(&ctx, "INSERT INTO a VALUES (2)", &[]).unwrap_err();
    assert!(err.is_driver_error());
    assert_eq!(err.downcast_driver_ref::<MemError>(), Some(&MemError::TxDone(1)));

    let err = locker.commit(&ctx).unwrap_err();
    assert_eq!(err.downcast_driver_ref::<MemError>(), Some(&MemError::TxDone(1)));
    assert_eq!(pool.transactions_begun(), 1);
}

#[test]
fn explicit_begin_tx_then_statements() {
    let (pool, locker) = setup();
    let (_scope, ctx) = request();

    let bound = locker.begin_tx(&ctx, &TxOptions::new().read_only()).unwrap();
    locker.execute(&ctx, "SELECT 1", &[]).unwrap();
    bound
        .with(|tx| tx.execute(&ctx, "SELECT 2", &[]).map(|_| ()))
        .unwrap();
    bound.commit().unwrap();

    assert!(pool.tx(1).unwrap().options().read_only);
    assert_eq!(
        pool.statements_on(Target::Tx(1)),
        vec!["BEGIN", "SELECT 1", "SELECT 2", "COMMIT"]
    );
}

#[test]
fn close_reaches_pool() {
    let (pool, locker) = setup();
    locker.close().unwrap();
    assert!(pool.is_closed());

    let err = locker.execute(&Context::background(), "SELECT 1", &[]).unwrap_err();
    assert_eq!(err.downcast_driver_ref::<MemError>(), Some(&MemError::PoolClosed));
}
