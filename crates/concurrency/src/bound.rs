//! Transaction-bound instance
//!
//! One [`BoundTx`] exists per (scope, pool) pair. It is created the first
//! time a transaction lineage touches a pool, stored in the lineage's
//! [`TxScope`](txlocker_core::TxScope), and reused for every later call in
//! that lineage.
//!
//! The live transaction sits inside the instance's mutex, so the only way to
//! reach it is by holding the lock. The instance is never destroyed by the
//! locker; finishing the transaction is the caller's job, through
//! [`BoundTx::commit`], [`BoundTx::rollback`] or the scope's owner registry.

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use txlocker_core::{Error, Pool, Result, ScopeId, Transaction, TxOwner};

/// Owned guard over an `Arc<Mutex<T>>`
pub type TxGuard<T> = ArcMutexGuard<RawMutex, T>;

/// Lock `mutex`, giving up when `deadline` passes
///
/// Without a deadline the wait is unbounded.
pub(crate) fn lock_until<T>(mutex: &Arc<Mutex<T>>, deadline: Option<Instant>) -> Result<TxGuard<T>> {
    match deadline {
        None => Ok(mutex.lock_arc()),
        Some(deadline) => mutex
            .try_lock_arc_until(deadline)
            .ok_or(Error::DeadlineExceeded),
    }
}

/// Transaction-bound instance shared by one context lineage
pub struct BoundTx<P: Pool> {
    scope_id: ScopeId,
    pool: Arc<P>,
    tx: Arc<Mutex<P::Tx>>,
    began_at: Instant,
}

impl<P: Pool> BoundTx<P> {
    pub(crate) fn new(scope_id: ScopeId, pool: Arc<P>, tx: P::Tx) -> Self {
        BoundTx {
            scope_id,
            pool,
            tx: Arc::new(Mutex::new(tx)),
            began_at: Instant::now(),
        }
    }

    /// Scope this transaction belongs to
    pub fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    /// Pool the transaction was begun on
    ///
    /// Held for the life of the instance, so the pool's address (its scope
    /// key) cannot be reused while the scope still maps it here.
    pub fn pool(&self) -> &Arc<P> {
        &self.pool
    }

    /// Time since the transaction was begun
    pub fn age(&self) -> Duration {
        self.began_at.elapsed()
    }

    pub(crate) fn lock_until(&self, deadline: Option<Instant>) -> Result<TxGuard<P::Tx>> {
        lock_until(&self.tx, deadline)
    }

    /// Run `f` against the transaction while holding its lock
    pub fn with<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&P::Tx) -> Result<T>,
    {
        let tx = self.tx.lock();
        f(&tx)
    }

    /// Commit the transaction
    ///
    /// Waits for any in-flight statement of the lineage. Driver errors,
    /// including "already finished", propagate unchanged.
    pub fn commit(&self) -> Result<()> {
        self.commit_until(None)
    }

    /// Roll back the transaction
    pub fn rollback(&self) -> Result<()> {
        self.rollback_until(None)
    }

    /// [`BoundTx::commit`], giving up with `Error::DeadlineExceeded` if the
    /// lock is not free by `deadline`
    pub fn commit_until(&self, deadline: Option<Instant>) -> Result<()> {
        self.lock_until(deadline)?.commit()
    }

    /// [`BoundTx::rollback`] with a bounded lock wait
    pub fn rollback_until(&self, deadline: Option<Instant>) -> Result<()> {
        self.lock_until(deadline)?.rollback()
    }
}

impl<P: Pool> TxOwner for BoundTx<P> {
    fn commit(&self) -> Result<()> {
        BoundTx::commit(self)
    }

    fn rollback(&self) -> Result<()> {
        BoundTx::rollback(self)
    }
}

impl<P: Pool> fmt::Debug for BoundTx<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundTx")
            .field("scope_id", &self.scope_id)
            .field("locked", &self.tx.is_locked())
            .field("age", &self.age())
            .finish()
    }
}
