//! Transaction counters
//!
//! Lock-free `AtomicU64` counters with `Relaxed` ordering: callers may
//! observe slightly stale totals but never torn values.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated by the transaction manager
#[derive(Debug, Default)]
pub(crate) struct MetricsRecorder {
    committed: AtomicU64,
    aborted: AtomicU64,
    conflicts: AtomicU64,
    retries: AtomicU64,
    reclaimed_transactions: AtomicU64,
    reclaimed_revisions: AtomicU64,
}

impl MetricsRecorder {
    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reclaimed(&self, transactions: usize, revisions: usize) {
        self.reclaimed_transactions
            .fetch_add(transactions as u64, Ordering::Relaxed);
        self.reclaimed_revisions
            .fetch_add(revisions as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, active_count: u64, pending_cleanup: u64) -> TransactionMetrics {
        let total_committed = self.committed.load(Ordering::Relaxed);
        let total_aborted = self.aborted.load(Ordering::Relaxed);
        let finished = total_committed + total_aborted;
        TransactionMetrics {
            total_committed,
            total_aborted,
            total_conflicts: self.conflicts.load(Ordering::Relaxed),
            total_retries: self.retries.load(Ordering::Relaxed),
            reclaimed_transactions: self.reclaimed_transactions.load(Ordering::Relaxed),
            reclaimed_revisions: self.reclaimed_revisions.load(Ordering::Relaxed),
            active_count,
            pending_cleanup,
            commit_rate: if finished == 0 {
                0.0
            } else {
                total_committed as f64 / finished as f64
            },
        }
    }
}

/// Point-in-time view of the transaction counters
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionMetrics {
    /// Total committed transactions
    pub total_committed: u64,
    /// Total aborted transactions
    pub total_aborted: u64,
    /// Commits rejected or writes refused because of a stale read
    pub total_conflicts: u64,
    /// Restarts performed by `run_in_transaction`
    pub total_retries: u64,
    /// Finished transactions removed from the cleanup queue
    pub reclaimed_transactions: u64,
    /// Revision nodes removed by consolidation
    pub reclaimed_revisions: u64,
    /// Currently active transactions
    pub active_count: u64,
    /// Finished transactions still waiting for cleanup
    pub pending_cleanup: u64,
    /// Commit success rate (0.0 - 1.0)
    pub commit_rate: f64,
}
