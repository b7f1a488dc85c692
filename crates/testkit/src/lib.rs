//! In-memory scripted driver for txlocker tests
//!
//! [`MemPool`] implements the driver traits without any SQL engine behind
//! them. Statements are answered from scripts keyed by SQL text, and every
//! call is journaled with the handle it ran on, so tests can check where a
//! statement went and whether two statements ever overlapped on one
//! transaction.
//!
//! ```text
//! let pool = MemPool::new();
//! pool.script_rows("SELECT id FROM t", &["id"], vec![vec![Value::Int(1)]]);
//! let locker = Locker::new(pool.clone(), "mem");
//! ```
//!
//! Unscripted statements succeed: `execute` reports one affected row and
//! `query` returns no rows.

#![warn(missing_docs)]

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use txlocker_core::{
    Context, Error, ExecResult, Pool, Queryer, Result, Row, Rows, Statement, Transaction,
    TxOptions, Value,
};

/// Errors reported by the in-memory driver
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemError {
    /// Operation on a committed or rolled back transaction
    #[error("sql: transaction {0} has already been committed or rolled back")]
    TxDone(u64),
    /// Operation on a closed pool
    #[error("sql: database is closed")]
    PoolClosed,
    /// Begin refused by the test
    #[error("sql: begin refused")]
    BeginRefused,
    /// Failure scripted for a statement
    #[error("sql: {0}")]
    Scripted(String),
}

/// Where a journaled statement ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Directly on the pool
    Pool,
    /// On the transaction with this id
    Tx(u64),
}

/// One journaled call
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    /// Handle the statement ran on
    pub target: Target,
    /// SQL text (`BEGIN`, `COMMIT` and `ROLLBACK` for lifecycle events)
    pub sql: String,
    /// Bound arguments
    pub args: Vec<Value>,
}

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Open
    Active,
    /// Committed
    Committed,
    /// Rolled back
    RolledBack,
}

#[derive(Debug, Clone)]
enum Script {
    Rows {
        columns: Arc<[String]>,
        rows: Vec<Vec<Value>>,
    },
    Affected(u64),
    Fail(String),
}

/// Observation point for one transaction
#[derive(Debug)]
pub struct TxProbe {
    id: u64,
    options: TxOptions,
    state: Mutex<TxState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    statements: AtomicUsize,
}

impl TxProbe {
    /// Transaction id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Options the transaction was begun with
    pub fn options(&self) -> &TxOptions {
        &self.options
    }

    /// Current lifecycle state
    pub fn state(&self) -> TxState {
        *self.state.lock()
    }

    /// Highest number of statements ever running at once on this transaction
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Statements run on this transaction
    pub fn statement_count(&self) -> usize {
        self.statements.load(Ordering::SeqCst)
    }

    fn ensure_active(&self) -> Result<()> {
        match *self.state.lock() {
            TxState::Active => Ok(()),
            _ => Err(Error::driver(MemError::TxDone(self.id))),
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    journal: Mutex<Vec<JournalEntry>>,
    scripts: Mutex<HashMap<String, Script>>,
    close_failures: Mutex<HashMap<String, String>>,
    txs: Mutex<Vec<Arc<TxProbe>>>,
    next_tx: AtomicU64,
    begin_delay: Mutex<Duration>,
    exec_delay: Mutex<Duration>,
    refuse_begin: AtomicBool,
    closed: AtomicBool,
    rows_opened: AtomicUsize,
    rows_closed: AtomicUsize,
    pool_in_flight: AtomicUsize,
    pool_max_in_flight: AtomicUsize,
}

/// Tracks a running statement for overlap detection
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        InFlight { counter }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Shared {
    fn record(&self, target: Target, sql: &str, args: &[Value]) {
        self.journal.lock().push(JournalEntry {
            target,
            sql: sql.to_string(),
            args: args.to_vec(),
        });
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::driver(MemError::PoolClosed));
        }
        Ok(())
    }

    fn script_for(&self, sql: &str) -> Option<Script> {
        self.scripts.lock().get(sql).cloned()
    }

    /// Common path for every statement: context, liveness, journal, overlap
    fn run<T>(
        &self,
        ctx: &Context,
        probe: Option<&TxProbe>,
        sql: &str,
        args: &[Value],
        answer: impl FnOnce(Option<Script>) -> Result<T>,
    ) -> Result<T> {
        ctx.check()?;
        self.check_open()?;
        let target = match probe {
            Some(p) => {
                p.ensure_active()?;
                p.statements.fetch_add(1, Ordering::SeqCst);
                Target::Tx(p.id)
            }
            None => Target::Pool,
        };
        self.record(target, sql, args);

        let _in_flight = match probe {
            Some(p) => InFlight::enter(&p.in_flight, &p.max_in_flight),
            None => InFlight::enter(&self.pool_in_flight, &self.pool_max_in_flight),
        };
        let delay = *self.exec_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        match self.script_for(sql) {
            Some(Script::Fail(msg)) => Err(Error::driver(MemError::Scripted(msg))),
            other => answer(other),
        }
    }

    fn execute(&self, ctx: &Context, probe: Option<&TxProbe>, sql: &str, args: &[Value]) -> Result<ExecResult> {
        self.run(ctx, probe, sql, args, |script| {
            let rows_affected = match script {
                Some(Script::Affected(n)) => n,
                Some(Script::Rows { rows, .. }) => rows.len() as u64,
                _ => 1,
            };
            Ok(ExecResult {
                rows_affected,
                last_insert_id: None,
            })
        })
    }

    fn query(
        self: &Arc<Self>,
        ctx: &Context,
        probe: Option<&TxProbe>,
        sql: &str,
        args: &[Value],
    ) -> Result<Box<dyn Rows>> {
        let (columns, rows) = self.run(ctx, probe, sql, args, |script| {
            Ok(match script {
                Some(Script::Rows { columns, rows }) => (columns, rows),
                _ => (Arc::from(Vec::<String>::new()), Vec::new()),
            })
        })?;
        self.rows_opened.fetch_add(1, Ordering::SeqCst);
        let close_failure = self.close_failures.lock().get(sql).cloned();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect();
        Ok(Box::new(MemRows {
            columns,
            rows,
            closed: false,
            close_failure,
            shared: Arc::clone(self),
        }))
    }

    fn query_row(&self, ctx: &Context, probe: Option<&TxProbe>, sql: &str, args: &[Value]) -> Result<Row> {
        self.run(ctx, probe, sql, args, |script| match script {
            Some(Script::Rows { columns, mut rows }) if !rows.is_empty() => {
                Ok(Row::new(columns, rows.swap_remove(0)))
            }
            _ => Err(Error::NoRows),
        })
    }
}

/// Scripted in-memory pool
///
/// Clones share all state, so a test can keep one clone for inspection and
/// hand another to the locker.
#[derive(Debug, Clone, Default)]
pub struct MemPool {
    shared: Arc<Shared>,
}

impl MemPool {
    /// Empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with a result set
    pub fn script_rows(&self, sql: &str, columns: &[&str], rows: Vec<Vec<Value>>) {
        let columns: Arc<[String]> = columns.iter().map(|c| c.to_string()).collect();
        self.shared
            .scripts
            .lock()
            .insert(sql.to_string(), Script::Rows { columns, rows });
    }

    /// Answer `sql` with an affected-row count
    pub fn script_affected(&self, sql: &str, rows_affected: u64) {
        self.shared
            .scripts
            .lock()
            .insert(sql.to_string(), Script::Affected(rows_affected));
    }

    /// Make `sql` fail with a driver error carrying `message`
    pub fn script_failure(&self, sql: &str, message: &str) {
        self.shared
            .scripts
            .lock()
            .insert(sql.to_string(), Script::Fail(message.to_string()));
    }

    /// Make closing the result set of `sql` fail with `message`
    ///
    /// The set still counts as released.
    pub fn script_close_failure(&self, sql: &str, message: &str) {
        self.shared
            .close_failures
            .lock()
            .insert(sql.to_string(), message.to_string());
    }

    /// Delay every begin, widening race windows
    pub fn set_begin_delay(&self, delay: Duration) {
        *self.shared.begin_delay.lock() = delay;
    }

    /// Delay every statement, widening overlap windows
    pub fn set_exec_delay(&self, delay: Duration) {
        *self.shared.exec_delay.lock() = delay;
    }

    /// Make begin fail (or succeed again)
    pub fn refuse_begin(&self, refuse: bool) {
        self.shared.refuse_begin.store(refuse, Ordering::SeqCst);
    }

    /// Snapshot of the journal
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.shared.journal.lock().clone()
    }

    /// SQL text run on `target`, in order
    pub fn statements_on(&self, target: Target) -> Vec<String> {
        self.shared
            .journal
            .lock()
            .iter()
            .filter(|e| e.target == target)
            .map(|e| e.sql.clone())
            .collect()
    }

    /// Number of transactions begun
    pub fn transactions_begun(&self) -> usize {
        self.shared.txs.lock().len()
    }

    /// Probe for the transaction with `id`
    pub fn tx(&self, id: u64) -> Option<Arc<TxProbe>> {
        self.shared.txs.lock().iter().find(|p| p.id == id).cloned()
    }

    /// Probes for every transaction begun, in begin order
    pub fn transactions(&self) -> Vec<Arc<TxProbe>> {
        self.shared.txs.lock().clone()
    }

    /// Result sets opened and not yet closed
    pub fn open_result_sets(&self) -> usize {
        self.shared.rows_opened.load(Ordering::SeqCst) - self.shared.rows_closed.load(Ordering::SeqCst)
    }

    /// Highest number of statements ever running at once on the bare pool
    pub fn pool_max_concurrency(&self) -> usize {
        self.shared.pool_max_in_flight.load(Ordering::SeqCst)
    }

    /// True once [`Pool::close`] was called
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

impl Queryer for MemPool {
    fn prepare(&self, ctx: &Context, query: &str) -> Result<Box<dyn Statement>> {
        ctx.check()?;
        self.shared.check_open()?;
        Ok(Box::new(MemStatement {
            sql: query.to_string(),
            probe: None,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn execute(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<ExecResult> {
        self.shared.execute(ctx, None, query, args)
    }

    fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.shared.query(ctx, None, query, args)
    }

    fn query_row(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<Row> {
        self.shared.query_row(ctx, None, query, args)
    }
}

impl Pool for MemPool {
    type Tx = MemTx;

    fn begin(&self, ctx: &Context, opts: &TxOptions) -> Result<MemTx> {
        ctx.check()?;
        self.shared.check_open()?;
        if self.shared.refuse_begin.load(Ordering::SeqCst) {
            return Err(Error::driver(MemError::BeginRefused));
        }
        let delay = *self.shared.begin_delay.lock();
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let id = self.shared.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        let probe = Arc::new(TxProbe {
            id,
            options: opts.clone(),
            state: Mutex::new(TxState::Active),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            statements: AtomicUsize::new(0),
        });
        self.shared.txs.lock().push(Arc::clone(&probe));
        self.shared.record(Target::Tx(id), "BEGIN", &[]);

        Ok(MemTx {
            probe,
            shared: Arc::clone(&self.shared),
        })
    }

    fn close(&self) -> Result<()> {
        self.shared.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Transaction on a [`MemPool`]
#[derive(Debug)]
pub struct MemTx {
    probe: Arc<TxProbe>,
    shared: Arc<Shared>,
}

impl MemTx {
    /// Transaction id
    pub fn id(&self) -> u64 {
        self.probe.id
    }

    fn finish(&self, to: TxState, sql: &str) -> Result<()> {
        let mut state = self.probe.state.lock();
        if *state != TxState::Active {
            return Err(Error::driver(MemError::TxDone(self.probe.id)));
        }
        *state = to;
        self.shared.record(Target::Tx(self.probe.id), sql, &[]);
        Ok(())
    }
}

impl Queryer for MemTx {
    fn prepare(&self, ctx: &Context, query: &str) -> Result<Box<dyn Statement>> {
        ctx.check()?;
        self.probe.ensure_active()?;
        Ok(Box::new(MemStatement {
            sql: query.to_string(),
            probe: Some(Arc::clone(&self.probe)),
            shared: Arc::clone(&self.shared),
        }))
    }

    fn execute(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<ExecResult> {
        self.shared.execute(ctx, Some(&self.probe), query, args)
    }

    fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.shared.query(ctx, Some(&self.probe), query, args)
    }

    fn query_row(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<Row> {
        self.shared.query_row(ctx, Some(&self.probe), query, args)
    }
}

impl Transaction for MemTx {
    fn commit(&self) -> Result<()> {
        self.finish(TxState::Committed, "COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.finish(TxState::RolledBack, "ROLLBACK")
    }
}

struct MemStatement {
    sql: String,
    probe: Option<Arc<TxProbe>>,
    shared: Arc<Shared>,
}

impl Statement for MemStatement {
    fn execute(&self, ctx: &Context, args: &[Value]) -> Result<ExecResult> {
        self.shared.execute(ctx, self.probe.as_deref(), &self.sql, args)
    }

    fn query(&self, ctx: &Context, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.shared.query(ctx, self.probe.as_deref(), &self.sql, args)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Result set; only an explicit [`Rows::close`] counts as released
struct MemRows {
    columns: Arc<[String]>,
    rows: VecDeque<Row>,
    closed: bool,
    close_failure: Option<String>,
    shared: Arc<Shared>,
}

impl Rows for MemRows {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.shared.rows_closed.fetch_add(1, Ordering::SeqCst);
        match self.close_failure.take() {
            Some(msg) => Err(Error::driver(MemError::Scripted(msg))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscripted_execute_affects_one_row() {
        let pool = MemPool::new();
        let ctx = Context::background();
        let res = pool.execute(&ctx, "INSERT INTO t VALUES (1)", &[]).unwrap();
        assert_eq!(res.rows_affected, 1);
        assert_eq!(pool.statements_on(Target::Pool), vec!["INSERT INTO t VALUES (1)"]);
    }

    #[test]
    fn test_finished_transaction_rejects_statements() {
        let pool = MemPool::new();
        let ctx = Context::background();
        let tx = pool.begin(&ctx, &TxOptions::default()).unwrap();
        tx.commit().unwrap();

        let err = tx.execute(&ctx, "UPDATE t SET x = 1", &[]).unwrap_err();
        assert_eq!(err.downcast_driver_ref::<MemError>(), Some(&MemError::TxDone(tx.id())));
        assert!(tx.rollback().is_err());
    }

    #[test]
    fn test_rows_must_be_closed_explicitly() {
        let pool = MemPool::new();
        pool.script_rows("SELECT 1", &["n"], vec![vec![Value::Int(1)]]);
        let ctx = Context::background();

        let mut rows = pool.query(&ctx, "SELECT 1", &[]).unwrap();
        assert_eq!(pool.open_result_sets(), 1);
        assert_eq!(rows.next_row().unwrap().unwrap().get::<i64>(0).unwrap(), 1);
        rows.close().unwrap();
        rows.close().unwrap();
        assert_eq!(pool.open_result_sets(), 0);
    }

    #[test]
    fn test_cancelled_context_is_honored() {
        let pool = MemPool::new();
        let ctx = Context::background().child();
        ctx.cancel();
        assert!(matches!(
            pool.execute(&ctx, "DELETE FROM t", &[]),
            Err(Error::Cancelled)
        ));
        assert!(pool.journal().is_empty());
    }
}
