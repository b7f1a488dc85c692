//! Transaction scope: explicit per-request transaction state
//!
//! A [`TxScope`] is created by the request-handling layer, injected into the
//! request [`Context`](crate::Context), and finished by that same layer with
//! [`TxScope::commit`] or [`TxScope::rollback`].
//!
//! It holds two things:
//! - keyed slots, one per pool, holding the lineage's transaction-bound state
//! - the owners to finish when the request completes
//!
//! ## Slot initialization
//!
//! [`TxScope::get_or_try_init`] is an atomic create-if-absent: concurrent
//! first callers on one key block until the single winner's initializer
//! returns, and only one initializer ever succeeds. A failed initializer
//! leaves the slot empty.

use crate::error::Result;
use crate::traits::TxOwner;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Type-erased value stored in a scope slot
pub type ScopeValue = Arc<dyn Any + Send + Sync>;

/// Unique identifier of a transaction scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(Uuid);

impl ScopeId {
    /// Create a new random ScopeId
    pub fn new() -> Self {
        ScopeId(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ScopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a scope slot: the identity of a shared handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeKey(usize);

impl ScopeKey {
    /// Key derived from the address of a shared handle
    ///
    /// Two clones of the same `Arc` yield the same key.
    pub fn of<T: ?Sized>(handle: &Arc<T>) -> Self {
        ScopeKey(Arc::as_ptr(handle) as *const () as usize)
    }

    /// Key from a caller-chosen raw identity
    pub fn from_raw(raw: usize) -> Self {
        ScopeKey(raw)
    }
}

type Slot = Arc<OnceCell<ScopeValue>>;

/// Per-request transaction state shared by a context lineage
pub struct TxScope {
    id: ScopeId,
    slots: DashMap<ScopeKey, Slot>,
    owners: Mutex<Vec<Arc<dyn TxOwner>>>,
}

impl TxScope {
    /// Create an empty scope
    pub fn new() -> Arc<Self> {
        Arc::new(TxScope {
            id: ScopeId::new(),
            slots: DashMap::new(),
            owners: Mutex::new(Vec::new()),
        })
    }

    /// Scope identity
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Current value of the slot at `key`, if initialized
    pub fn get_value(&self, key: ScopeKey) -> Option<ScopeValue> {
        let slot = self.slots.get(&key)?.value().clone();
        slot.get().cloned()
    }

    /// Store `value` at `key`, replacing whatever was there
    pub fn set_value(&self, key: ScopeKey, value: ScopeValue) {
        self.slots.insert(key, Arc::new(OnceCell::with_value(value)));
    }

    /// Return the value at `key`, running `init` to create it if absent
    ///
    /// Exactly one successful `init` per key. The slot's shard lock is not
    /// held while `init` runs; waiters block on the slot itself.
    pub fn get_or_try_init<F>(&self, key: ScopeKey, init: F) -> Result<ScopeValue>
    where
        F: FnOnce() -> Result<ScopeValue>,
    {
        let slot = self
            .slots
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();
        slot.get_or_try_init(init).cloned()
    }

    /// Register an owner to be finished with the scope
    pub fn register_owner(&self, owner: Arc<dyn TxOwner>) {
        self.owners.lock().push(owner);
    }

    /// Number of owners not yet finished
    pub fn owner_count(&self) -> usize {
        self.owners.lock().len()
    }

    /// Commit every registered owner in registration order
    ///
    /// On the first failure the remaining owners are rolled back and the
    /// failure is returned.
    pub fn commit(&self) -> Result<()> {
        let owners = std::mem::take(&mut *self.owners.lock());
        debug!(target: "txlocker::scope", scope = %self.id, owners = owners.len(), "Committing scope");

        let mut iter = owners.into_iter();
        while let Some(owner) = iter.next() {
            if let Err(e) = owner.commit() {
                for rest in iter.by_ref() {
                    let _ = rest.rollback();
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Roll back every registered owner, returning the first failure
    pub fn rollback(&self) -> Result<()> {
        let owners = std::mem::take(&mut *self.owners.lock());
        debug!(target: "txlocker::scope", scope = %self.id, owners = owners.len(), "Rolling back scope");

        let mut first_err = None;
        for owner in owners {
            if let Err(e) = owner.rollback() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TxScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TxScope")
            .field("id", &self.id)
            .field("slots", &self.slots.len())
            .field("owners", &self.owner_count())
            .finish()
    }
}
