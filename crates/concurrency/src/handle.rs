//! Acquired handles
//!
//! A [`Handle`] is what the locker hands out: the Queryer to use for one
//! call plus whatever must be released afterwards. Release happens exactly
//! once, when the handle is dropped or passed to [`Handle::release`],
//! including during unwinding.
//!
//! | Variant | Decision case | Holds |
//! |---------|---------------|-------|
//! | `Pool` | no transaction scope | shared pool, no lock |
//! | `Serialized` | scope slot holds a foreign value | shared pool + the locker's own lock |
//! | `Transaction` | lineage transaction (existing or just begun) | the transaction's lock |

use crate::bound::{BoundTx, TxGuard};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use txlocker_core::{
    Context, ExecResult, Pool, Queryer, Result, Row, Rows, Statement, TxOptions, Value,
};

/// Queryer plus release obligation
pub enum Handle<P: Pool> {
    /// Direct pool access; release is a no-op
    Pool(Arc<P>),
    /// Pool access serialized on the locker's own lock
    Serialized {
        /// Shared pool
        pool: Arc<P>,
        /// Locker lock, released on drop
        guard: TxGuard<()>,
    },
    /// Exclusive access to the lineage's transaction
    Transaction {
        /// The transaction-bound instance
        bound: Arc<BoundTx<P>>,
        /// Transaction lock, released on drop
        guard: TxGuard<P::Tx>,
    },
}

/// Which decision case produced a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// No transaction scope
    Pool,
    /// Foreign value in the scope slot
    Serialized,
    /// Lineage transaction
    Transaction,
}

impl<P: Pool> Handle<P> {
    /// Decision case of this handle
    pub fn kind(&self) -> HandleKind {
        match self {
            Handle::Pool(_) => HandleKind::Pool,
            Handle::Serialized { .. } => HandleKind::Serialized,
            Handle::Transaction { .. } => HandleKind::Transaction,
        }
    }

    /// True for the transaction variant
    pub fn is_transaction(&self) -> bool {
        matches!(self, Handle::Transaction { .. })
    }

    /// The transaction-bound instance, for the transaction variant
    pub fn bound_tx(&self) -> Option<&Arc<BoundTx<P>>> {
        match self {
            Handle::Transaction { bound, .. } => Some(bound),
            _ => None,
        }
    }

    /// Begin a transaction through this handle
    ///
    /// On the transaction variant this is a no-op returning the held
    /// transaction: a transaction cannot be begun twice. Otherwise an
    /// independent transaction is begun on the pool and owned by the caller.
    pub fn begin_tx(&self, ctx: &Context, opts: &TxOptions) -> Result<Began<'_, P::Tx>> {
        match self {
            Handle::Transaction { guard, .. } => Ok(Began::Scoped(&**guard)),
            Handle::Pool(pool) | Handle::Serialized { pool, .. } => {
                pool.begin(ctx, opts).map(Began::Owned)
            }
        }
    }

    /// Release whatever this handle holds
    pub fn release(self) {
        drop(self)
    }

    fn queryer(&self) -> &dyn Queryer {
        match self {
            Handle::Pool(pool) | Handle::Serialized { pool, .. } => &**pool,
            Handle::Transaction { guard, .. } => &**guard,
        }
    }
}

impl<P: Pool> Queryer for Handle<P> {
    fn prepare(&self, ctx: &Context, query: &str) -> Result<Box<dyn Statement>> {
        self.queryer().prepare(ctx, query)
    }

    fn execute(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<ExecResult> {
        self.queryer().execute(ctx, query, args)
    }

    fn query(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.queryer().query(ctx, query, args)
    }

    fn query_row(&self, ctx: &Context, query: &str, args: &[Value]) -> Result<Row> {
        self.queryer().query_row(ctx, query, args)
    }
}

impl<P: Pool> fmt::Debug for Handle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Transaction { bound, .. } => f
                .debug_struct("Handle::Transaction")
                .field("scope_id", &bound.scope_id())
                .finish(),
            other => write!(f, "Handle::{:?}", other.kind()),
        }
    }
}

/// Transaction obtained from [`Handle::begin_tx`]
pub enum Began<'a, T> {
    /// The lineage transaction, still owned by the scope
    Scoped(&'a T),
    /// A fresh transaction owned by the caller
    Owned(T),
}

impl<T> Began<'_, T> {
    /// True when this is the lineage transaction
    pub fn is_scoped(&self) -> bool {
        matches!(self, Began::Scoped(_))
    }
}

impl<T> Deref for Began<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Began::Scoped(tx) => tx,
            Began::Owned(tx) => tx,
        }
    }
}
