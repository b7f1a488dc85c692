//! Context-scoped transaction locker
//!
//! A [`Locker`] sits in front of one shared pool and decides, per call, which
//! Queryer the caller gets and what must be released afterwards.
//!
//! ## Decision Procedure
//!
//! ```text
//! acquire(ctx)
//!   ctx has no TxScope                  -> Pool         (no lock)
//!   scope slot for this pool:
//!     empty                             -> begin tx, store BoundTx, register owner,
//!                                          lock it     -> Transaction
//!     BoundTx                           -> lock it     -> Transaction
//!     anything else                     -> lock locker -> Serialized
//! ```
//!
//! The empty-slot path runs through [`TxScope::get_or_try_init`], so exactly
//! one transaction is begun per lineage even when several first callers race.
//!
//! The `Serialized` path exists for slots filled by some other mechanism.
//! Whether such a value is legitimate or a bookkeeping bug is unknown, so the
//! locker degrades to coarse locking on the pool and logs a warning rather
//! than failing.
//!
//! ## Lifecycle
//!
//! Per lineage: `NoScope` stays `NoScope`; `Scoped -> (first acquire) -> Active`.
//! The locker never leaves `Active`: committing or rolling back is up to the
//! caller, and calls after that reach the finished transaction and surface the
//! driver's error.
//!
//! Lock waits honor the context deadline. The locker imposes no timeout of
//! its own; a caller that holds a handle forever starves its lineage.
//! Locks are not reentrant: acquiring twice on one thread within a lineage
//! deadlocks.

use crate::bound::{lock_until, BoundTx};
use crate::handle::Handle;
use crate::metrics::{AcquisitionCounters, LockerMetrics};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use txlocker_core::{
    Context, Error, Pool, Queryer, Result, ScopeKey, ScopeValue, TxOptions, TxScope,
};

/// Context-scoped transaction locker bound to one shared pool
///
/// A locker created here never holds a transaction itself; it spawns
/// [`BoundTx`] instances into transaction scopes on demand.
///
/// Cloning is cheap and clones share the pool, the fallback lock and the
/// metrics.
pub struct Locker<P: Pool> {
    pool: Arc<P>,
    driver: Arc<str>,
    lock: Arc<Mutex<()>>,
    tx_options: TxOptions,
    counters: Arc<AcquisitionCounters>,
}

impl<P: Pool> Locker<P> {
    /// Wrap an already-open pool
    pub fn new(pool: P, driver: impl Into<String>) -> Self {
        Self::from_shared(Arc::new(pool), driver)
    }

    /// Wrap a pool that is already shared
    ///
    /// Lockers built over clones of the same `Arc` share lineage transactions.
    pub fn from_shared(pool: Arc<P>, driver: impl Into<String>) -> Self {
        Locker {
            pool,
            driver: Arc::from(driver.into()),
            lock: Arc::new(Mutex::new(())),
            tx_options: TxOptions::default(),
            counters: Arc::new(AcquisitionCounters::default()),
        }
    }

    /// Options used when a lineage begins its transaction
    pub fn with_tx_options(mut self, opts: TxOptions) -> Self {
        self.tx_options = opts;
        self
    }

    /// Configured driver name
    pub fn driver_name(&self) -> &str {
        &self.driver
    }

    /// The shared pool
    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    /// Key under which this locker's lineage transactions are stored
    pub fn scope_key(&self) -> ScopeKey {
        ScopeKey::of(&self.pool)
    }

    /// Options used when a lineage begins its transaction
    pub fn tx_options(&self) -> &TxOptions {
        &self.tx_options
    }

    /// Acquisition metrics snapshot
    pub fn metrics(&self) -> LockerMetrics {
        self.counters.snapshot()
    }

    /// Acquire the Queryer for `ctx`
    ///
    /// The returned handle must be released (dropped) once the call is done.
    ///
    /// # Errors
    ///
    /// - Driver error if a lineage transaction had to be begun and begin failed
    /// - `Error::DeadlineExceeded` if the context deadline passed while waiting
    ///   for a lock
    pub fn acquire(&self, ctx: &Context) -> Result<Handle<P>> {
        self.acquire_with(ctx, &self.tx_options)
    }

    fn acquire_with(&self, ctx: &Context, opts: &TxOptions) -> Result<Handle<P>> {
        let scope = match ctx.tx_scope() {
            Some(scope) => scope,
            None => {
                self.counters.record_pool();
                trace!(target: "txlocker::locker", driver = %self.driver, "Pool acquisition");
                return Ok(Handle::Pool(Arc::clone(&self.pool)));
            }
        };

        let value = scope.get_or_try_init(self.scope_key(), || self.begin_bound(ctx, scope, opts))?;

        match value.downcast::<BoundTx<P>>() {
            Ok(bound) => {
                let guard = bound.lock_until(ctx.deadline())?;
                self.counters.record_transaction();
                trace!(target: "txlocker::locker", scope = %scope.id(), "Transaction acquisition");
                Ok(Handle::Transaction { bound, guard })
            }
            Err(_) => {
                warn!(
                    target: "txlocker::locker",
                    scope = %scope.id(),
                    driver = %self.driver,
                    "Scope slot holds a foreign value; serializing on the pool"
                );
                let guard = lock_until(&self.lock, ctx.deadline())?;
                self.counters.record_serialized();
                Ok(Handle::Serialized {
                    pool: Arc::clone(&self.pool),
                    guard,
                })
            }
        }
    }

    fn begin_bound(&self, ctx: &Context, scope: &Arc<TxScope>, opts: &TxOptions) -> Result<ScopeValue> {
        let tx = self.pool.begin(ctx, opts)?;
        let bound = Arc::new(BoundTx::<P>::new(scope.id(), Arc::clone(&self.pool), tx));
        scope.register_owner(bound.clone());
        self.counters.record_begin();

        debug!(
            target: "txlocker::locker",
            scope = %scope.id(),
            driver = %self.driver,
            isolation = ?opts.isolation,
            read_only = opts.read_only,
            "Transaction begun for scope"
        );

        let value: ScopeValue = bound;
        Ok(value)
    }

    /// Run `f` with the Queryer for `ctx`, releasing it on every exit path
    pub fn with_queryer<T, F>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Queryer) -> Result<T>,
    {
        let handle = self.acquire(ctx)?;
        f(&handle)
    }

    /// Run `f` with the full handle for `ctx`, releasing it on every exit path
    ///
    /// The handle also exposes [`Handle::begin_tx`] for callers that need
    /// explicit transaction control.
    pub fn with_database<T, F>(&self, ctx: &Context, f: F) -> Result<T>
    where
        F: FnOnce(&Handle<P>) -> Result<T>,
    {
        let handle = self.acquire(ctx)?;
        f(&handle)
    }

    /// Start (or join) the lineage transaction of `ctx`
    ///
    /// `opts` applies only if this call is the one that begins it.
    ///
    /// # Errors
    ///
    /// `Error::NoTransactionContext` when `ctx` carries no transaction scope
    /// (or its slot is not a transaction). This never begins an unscoped
    /// transaction.
    pub fn begin_tx(&self, ctx: &Context, opts: &TxOptions) -> Result<Arc<BoundTx<P>>> {
        let handle = self.acquire_with(ctx, opts)?;
        let bound = handle.bound_tx().cloned();
        handle.release();
        bound.ok_or_else(|| Error::no_transaction_context("begin_tx outside a transaction scope"))
    }

    /// [`Locker::begin_tx`] with the locker's default options
    pub fn begin(&self, ctx: &Context) -> Result<Arc<BoundTx<P>>> {
        self.begin_tx(ctx, &self.tx_options)
    }

    /// The lineage transaction of `ctx` for this pool, without beginning one
    pub fn bound_tx(&self, ctx: &Context) -> Option<Arc<BoundTx<P>>> {
        let value = ctx.tx_scope()?.get_value(self.scope_key())?;
        value.downcast::<BoundTx<P>>().ok()
    }

    /// Commit the lineage transaction of `ctx`
    ///
    /// # Errors
    ///
    /// - `Error::NoTransactionContext` if no transaction was begun for `ctx`
    /// - `Error::DeadlineExceeded` if the context deadline passed while
    ///   waiting for the transaction lock
    /// - Driver errors from the commit, unchanged
    pub fn commit(&self, ctx: &Context) -> Result<()> {
        self.bound_tx(ctx)
            .ok_or_else(|| Error::no_transaction_context("commit without a transaction"))?
            .commit_until(ctx.deadline())
    }

    /// Roll back the lineage transaction of `ctx`
    ///
    /// # Errors
    ///
    /// - `Error::NoTransactionContext` if no transaction was begun for `ctx`
    /// - `Error::DeadlineExceeded` if the context deadline passed while
    ///   waiting for the transaction lock
    /// - Driver errors from the rollback, unchanged
    pub fn rollback(&self, ctx: &Context) -> Result<()> {
        self.bound_tx(ctx)
            .ok_or_else(|| Error::no_transaction_context("rollback without a transaction"))?
            .rollback_until(ctx.deadline())
    }

    /// Close the pool. No further operations are valid afterward.
    pub fn close(&self) -> Result<()> {
        debug!(target: "txlocker::locker", driver = %self.driver, "Closing pool");
        self.pool.close()
    }
}

impl<P: Pool> Clone for Locker<P> {
    fn clone(&self) -> Self {
        Locker {
            pool: Arc::clone(&self.pool),
            driver: Arc::clone(&self.driver),
            lock: Arc::clone(&self.lock),
            tx_options: self.tx_options.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<P: Pool> fmt::Debug for Locker<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locker")
            .field("driver", &self.driver)
            .field("tx_options", &self.tx_options)
            .field("metrics", &self.metrics())
            .finish()
    }
}
