//! Statement executor
//!
//! Acquire-use-release wrappers over a [`Locker`]. Every call checks the
//! context, holds one acquisition for its whole duration and releases it on
//! every exit path. Result sets are always closed before the acquisition is
//! released.

use tracing::trace;
use txlocker_concurrency::Locker;
use txlocker_core::{Context, ExecResult, Pool, Queryer, Result, Row, Rows, Value};

/// Statement-level surface over a locker
pub trait StatementExecutor {
    /// Execute a statement that returns no rows
    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult>;

    /// Run a single-row query and hand the row to `handler`
    ///
    /// # Errors
    ///
    /// `Error::NoRows` when the query matches nothing; the handler's error,
    /// unchanged, when it fails.
    fn query_row<T, F>(&self, ctx: &Context, handler: F, sql: &str, args: &[Value]) -> Result<T>
    where
        F: FnOnce(&Row) -> Result<T>;

    /// Run a multi-row query, calling `handler` once per row
    ///
    /// Iteration stops at the first handler failure and that error is
    /// returned unchanged. The result set is closed on every path; a close
    /// failure is reported only when iteration itself succeeded.
    ///
    /// Returns the number of rows handled.
    fn query_many<F>(&self, ctx: &Context, handler: F, sql: &str, args: &[Value]) -> Result<usize>
    where
        F: FnMut(&Row) -> Result<()>;
}

impl<P: Pool> StatementExecutor for Locker<P> {
    fn execute(&self, ctx: &Context, sql: &str, args: &[Value]) -> Result<ExecResult> {
        ctx.check()?;
        trace!(target: "txlocker::executor", sql, args = args.len(), "execute");
        self.with_queryer(ctx, |q| q.execute(ctx, sql, args))
    }

    fn query_row<T, F>(&self, ctx: &Context, handler: F, sql: &str, args: &[Value]) -> Result<T>
    where
        F: FnOnce(&Row) -> Result<T>,
    {
        ctx.check()?;
        trace!(target: "txlocker::executor", sql, args = args.len(), "query_row");
        self.with_queryer(ctx, |q| {
            let row = q.query_row(ctx, sql, args)?;
            handler(&row)
        })
    }

    fn query_many<F>(&self, ctx: &Context, mut handler: F, sql: &str, args: &[Value]) -> Result<usize>
    where
        F: FnMut(&Row) -> Result<()>,
    {
        ctx.check()?;
        trace!(target: "txlocker::executor", sql, args = args.len(), "query_many");
        self.with_queryer(ctx, |q| {
            let mut rows = OpenRows(q.query(ctx, sql, args)?);
            let handled = drain(rows.0.as_mut(), &mut handler);
            let closed = rows.0.close();
            let handled = handled?;
            closed?;
            Ok(handled)
        })
    }
}

/// Closes the result set when dropped, including while unwinding
struct OpenRows(Box<dyn Rows>);

impl Drop for OpenRows {
    fn drop(&mut self) {
        let _ = self.0.close();
    }
}

fn drain<F>(rows: &mut dyn Rows, handler: &mut F) -> Result<usize>
where
    F: FnMut(&Row) -> Result<()>,
{
    let mut handled = 0;
    while let Some(row) = rows.next_row()? {
        handler(&row)?;
        handled += 1;
    }
    Ok(handled)
}
