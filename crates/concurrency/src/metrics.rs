//! Acquisition metrics
//!
//! The counters use Relaxed ordering: they are purely observational and do
//! not synchronize any other memory operation.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct AcquisitionCounters {
    pool: AtomicU64,
    transaction: AtomicU64,
    serialized: AtomicU64,
    begun: AtomicU64,
}

impl AcquisitionCounters {
    pub(crate) fn record_pool(&self) {
        self.pool.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction(&self) {
        self.transaction.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_serialized(&self) {
        self.serialized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_begin(&self) {
        self.begun.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LockerMetrics {
        LockerMetrics {
            pool_acquisitions: self.pool.load(Ordering::Relaxed),
            transaction_acquisitions: self.transaction.load(Ordering::Relaxed),
            serialized_acquisitions: self.serialized.load(Ordering::Relaxed),
            transactions_begun: self.begun.load(Ordering::Relaxed),
        }
    }
}

/// Locker metrics
///
/// Snapshot of how acquisitions were routed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockerMetrics {
    /// Acquisitions served by the bare pool (no transaction scope)
    pub pool_acquisitions: u64,
    /// Acquisitions served by a lineage transaction
    pub transaction_acquisitions: u64,
    /// Acquisitions serialized on the locker's own lock
    pub serialized_acquisitions: u64,
    /// Transactions begun on behalf of lineages
    pub transactions_begun: u64,
}

impl LockerMetrics {
    /// Total acquisitions across all routes
    pub fn total_acquisitions(&self) -> u64 {
        self.pool_acquisitions + self.transaction_acquisitions + self.serialized_acquisitions
    }

    /// Transaction acquisitions that reused an existing lineage transaction
    pub fn reused_transactions(&self) -> u64 {
        self.transaction_acquisitions
            .saturating_sub(self.transactions_begun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = AcquisitionCounters::default();
        assert_eq!(counters.snapshot(), LockerMetrics::default());
    }

    #[test]
    fn test_snapshot_totals() {
        let counters = AcquisitionCounters::default();
        counters.record_pool();
        counters.record_pool();
        counters.record_begin();
        counters.record_transaction();
        counters.record_transaction();
        counters.record_serialized();

        let m = counters.snapshot();
        assert_eq!(m.total_acquisitions(), 5);
        assert_eq!(m.transactions_begun, 1);
        assert_eq!(m.reused_transactions(), 1);
    }
}
