//! Revision garbage collection
//!
//! Every finished transaction (committed or aborted) is pushed onto the
//! cleanup queue, a singly linked list whose head is advanced with
//! compare-and-swap. Cleanup passes run inline on committing and aborting
//! threads; there is no background collector.
//!
//! A pass takes the horizon (the oldest snapshot any live transaction may
//! still read) and walks the queue once. Each entry whose revision is at or
//! below the horizon is unlinked and, for every cell it wrote, the cell's
//! chain is consolidated behind that transaction's node.
//!
//! Passes are best-effort: only one thread collects at a time, and a thread
//! that finds a pass in progress skips its own. Entries left behind are
//! picked up by the next pass.

use crate::chain::Versioned;
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_stm_core::{Revision, RevisionSlot};

/// A finished transaction awaiting collection
pub(crate) struct Finished {
    txn_id: u64,
    target: RevisionSlot,
    writes: Vec<Arc<dyn Versioned>>,
    next: ArcSwapOption<Finished>,
}

impl Finished {
    pub(crate) fn new(txn_id: u64, target: RevisionSlot, writes: Vec<Arc<dyn Versioned>>) -> Self {
        Finished {
            txn_id,
            target,
            writes,
            next: ArcSwapOption::empty(),
        }
    }
}

/// Result of one cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionReport {
    /// Finished transactions removed from the queue
    pub transactions: usize,
    /// Revision nodes removed from chains
    pub revisions: usize,
}

/// Lock-free queue of finished transactions
pub(crate) struct CleanupQueue {
    head: ArcSwapOption<Finished>,
    len: AtomicUsize,
    collecting: Mutex<()>,
}

type Entry = Option<Arc<Finished>>;

fn same_entry(a: &Entry, b: &Entry) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl CleanupQueue {
    pub(crate) fn new() -> Self {
        CleanupQueue {
            head: ArcSwapOption::empty(),
            len: AtomicUsize::new(0),
            collecting: Mutex::new(()),
        }
    }

    /// Push a finished transaction at the head
    pub(crate) fn push(&self, finished: Finished) {
        let entry = Arc::new(finished);
        loop {
            let current = self.head.load_full();
            entry.next.store(current.clone());
            let previous = self
                .head
                .compare_and_swap(&current, Some(Arc::clone(&entry)));
            if same_entry(&*previous, &current) {
                break;
            }
            std::hint::spin_loop();
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of queued transactions
    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Reclaim every entry at or below `horizon`
    ///
    /// Returns `None` when another thread is already collecting.
    pub(crate) fn collect(&self, horizon: Revision) -> Option<CollectionReport> {
        let _guard = self.collecting.try_lock()?;
        let mut report = CollectionReport::default();

        let mut predecessor: Entry = None;
        let mut cursor = self.head.load_full();
        while let Some(entry) = cursor {
            let next = entry.next.load_full();
            let revision = entry.target.get();
            if revision.is_provisional() || revision > horizon {
                cursor = next;
                predecessor = Some(entry);
                continue;
            }

            for cell in &entry.writes {
                report.revisions += cell.consolidate(&entry.target, horizon);
            }
            predecessor = self.unlink(predecessor, &entry, next.clone());
            report.transactions += 1;
            self.len.fetch_sub(1, Ordering::Relaxed);
            tracing::trace!(txn_id = entry.txn_id, revision = %revision, "reclaimed transaction");
            cursor = next;
        }

        Some(report)
    }

    /// Unlink `entry`, returning the predecessor of `next`
    ///
    /// Only the collecting thread rewrites `next` pointers of published
    /// entries; pushers only ever replace the head.
    fn unlink(&self, predecessor: Entry, entry: &Arc<Finished>, next: Entry) -> Entry {
        if let Some(predecessor) = predecessor {
            predecessor.next.store(next);
            return Some(predecessor);
        }

        let expected = Some(Arc::clone(entry));
        let previous = self.head.compare_and_swap(&expected, next.clone());
        if same_entry(&*previous, &expected) {
            return None;
        }

        // Entries were pushed in front of `entry` since the walk started.
        let mut cursor = self.head.load_full();
        while let Some(candidate) = cursor {
            let after = candidate.next.load_full();
            if same_entry(&after, &expected) {
                candidate.next.store(next);
                return Some(candidate);
            }
            cursor = after;
        }
        None
    }
}
