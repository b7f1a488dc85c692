//! Request context
//!
//! A [`Context`] travels with every call into the locker. It carries:
//! - cancellation (propagates from a context to everything derived from it)
//! - an optional deadline (a derived deadline never outlives its parent's)
//! - an optional [`TxScope`], the explicit per-request transaction state
//!
//! Contexts derived from one scoped context form a lineage: they all share
//! the same `Arc<TxScope>` and therefore the same transaction.
//!
//! ```text
//! let scope = TxScope::new();
//! let ctx = Context::background().with_tx_scope(Arc::clone(&scope));
//! let child = ctx.with_timeout(Duration::from_secs(2)); // same lineage
//! ```

use crate::error::{Error, Result};
use crate::scope::TxScope;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Request context with cancellation, deadline and transaction scope
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    parent: Option<Context>,
    deadline: Option<Instant>,
    cancelled: AtomicBool,
    scope: Option<Arc<TxScope>>,
}

impl Context {
    /// Root context: never cancelled, no deadline, no transaction scope
    pub fn background() -> Self {
        Context {
            inner: Arc::new(ContextInner {
                parent: None,
                deadline: None,
                cancelled: AtomicBool::new(false),
                scope: None,
            }),
        }
    }

    fn derive(&self, deadline: Option<Instant>, scope: Option<Arc<TxScope>>) -> Self {
        let deadline = match (self.inner.deadline, deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Context {
            inner: Arc::new(ContextInner {
                parent: Some(self.clone()),
                deadline,
                cancelled: AtomicBool::new(false),
                scope,
            }),
        }
    }

    /// Derived context in the same lineage, cancellable on its own
    pub fn child(&self) -> Self {
        self.derive(None, self.inner.scope.clone())
    }

    /// Derived context that expires at `deadline` (or the parent's, if earlier)
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(Some(deadline), self.inner.scope.clone())
    }

    /// Derived context that expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derived context that starts a new transaction lineage bound to `scope`
    pub fn with_tx_scope(&self, scope: Arc<TxScope>) -> Self {
        self.derive(None, Some(scope))
    }

    /// Cancel this context and every context derived from it
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Effective deadline
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// True if this context or an ancestor was cancelled
    pub fn is_cancelled(&self) -> bool {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if ctx.inner.cancelled.load(Ordering::SeqCst) {
                return true;
            }
            current = ctx.inner.parent.as_ref();
        }
        false
    }

    /// Fail if the context is cancelled or past its deadline
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// True if this context belongs to a transaction lineage
    pub fn is_tx_scoped(&self) -> bool {
        self.inner.scope.is_some()
    }

    /// The lineage's transaction scope, if any
    pub fn tx_scope(&self) -> Option<&Arc<TxScope>> {
        self.inner.scope.as_ref()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.is_cancelled())
            .field("scope", &self.inner.scope.as_ref().map(|s| s.id()))
            .finish()
    }
}
