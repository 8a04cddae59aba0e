//! Transactions
//!
//! A transaction reads from a fixed snapshot (its source revision) and
//! writes provisional revisions stamped with its own [`RevisionSlot`]
//! (its target revision). Reads and writes are tracked so the manager can
//! validate the transaction at commit time.
//!
//! # Read-Your-Writes
//!
//! A chain walk returns the transaction's own revision as soon as it meets
//! it. Such reads are not tracked in the read set.
//!
//! # Fail-Fast Conflicts
//!
//! A read that passes over a revision committed after the snapshot raises
//! the conflict flag. Any later write fails immediately with
//! `WriteConflict` instead of waiting for commit-time validation.
//!
//! # Lifecycle
//!
//! 1. **BEGIN**: `TransactionManager::begin()`, status is `Active`
//! 2. **READ/WRITE**: through cells, e.g. `cell.get(&mut txn)`
//! 3. **COMMIT/ABORT**: `TransactionManager::commit()` or `abort()`
//!
//! A transaction dropped while still active is aborted.

use crate::chain::{chain_id, ReadView, Versioned};
use crate::manager::ManagerState;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use strata_stm_core::{Revision, RevisionSlot, StmError, StmResult, TransactionStatus};

/// A unit of work over versioned cells
pub struct Transaction {
    id: u64,
    owner: ThreadId,
    source: Revision,
    target: RevisionSlot,
    read_set: FxHashMap<usize, Arc<dyn Versioned>>,
    write_set: FxHashMap<usize, Arc<dyn Versioned>>,
    conflict: bool,
    started_at: Instant,
    pub(crate) manager: Arc<ManagerState>,
}

impl Transaction {
    pub(crate) fn new(
        id: u64,
        source: Revision,
        target: Revision,
        manager: Arc<ManagerState>,
    ) -> Self {
        Transaction {
            id,
            owner: thread::current().id(),
            source,
            target: RevisionSlot::new(target),
            read_set: FxHashMap::default(),
            write_set: FxHashMap::default(),
            conflict: false,
            started_at: Instant::now(),
            manager,
        }
    }

    /// Unique transaction ID
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Snapshot revision this transaction reads from
    pub fn source_revision(&self) -> Revision {
        self.source
    }

    /// Current value of the target revision slot
    pub fn target_revision(&self) -> Revision {
        self.target.get()
    }

    /// Lifecycle status, derived from the target revision
    pub fn status(&self) -> TransactionStatus {
        self.target.status()
    }

    /// Check if transaction is still running
    pub fn is_active(&self) -> bool {
        self.status() == TransactionStatus::Active
    }

    /// A read observed a revision committed after the snapshot
    pub fn has_conflict(&self) -> bool {
        self.conflict
    }

    /// Number of cells in the read set
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Number of cells in the write set
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// A read-only transaction commits without validation
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty()
    }

    /// Time since the transaction began
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn owner(&self) -> ThreadId {
        self.owner
    }

    pub(crate) fn target(&self) -> &RevisionSlot {
        &self.target
    }

    pub(crate) fn view(&self) -> ReadView<'_> {
        ReadView {
            source: self.source,
            target: &self.target,
        }
    }

    /// Cells may only be used by the owning thread while active
    pub(crate) fn ensure_usable(&self) -> StmResult<()> {
        if !self.is_active() {
            return Err(StmError::NotActive {
                txn_id: self.id,
                status: self.status(),
            });
        }
        if thread::current().id() != self.owner {
            return Err(StmError::NotOwner { txn_id: self.id });
        }
        Ok(())
    }

    /// Writes are refused once a stale read has been observed
    pub(crate) fn ensure_writable(&self) -> StmResult<()> {
        self.ensure_usable()?;
        if self.conflict {
            self.manager.metrics.record_conflict();
            return Err(StmError::write_conflict(format!(
                "transaction {} read a revision committed after snapshot {}",
                self.id, self.source
            )));
        }
        Ok(())
    }

    /// Account for a chain walk
    pub(crate) fn observe(&mut self, cell: Arc<dyn Versioned>, newer_committed: bool, own_write: bool) {
        if newer_committed {
            self.conflict = true;
        }
        if !own_write {
            self.read_set.insert(chain_id(&cell), cell);
        }
    }

    pub(crate) fn record_write(&mut self, cell: Arc<dyn Versioned>) {
        self.write_set.insert(chain_id(&cell), cell);
    }

    /// Whether every cell read is still unchanged since the snapshot
    pub(crate) fn reads_are_current(&self) -> bool {
        self.read_set
            .values()
            .all(|cell| !cell.has_commit_after(self.source))
    }

    pub(crate) fn clear_reads(&mut self) {
        self.read_set.clear();
    }

    pub(crate) fn take_writes(&mut self) -> Vec<Arc<dyn Versioned>> {
        self.write_set.drain().map(|(_, cell)| cell).collect()
    }

    /// Chain exhausted without a visible revision
    pub(crate) fn invariant_violation(&self, cell: &str) -> StmError {
        tracing::error!(
            txn_id = self.id,
            source_revision = %self.source,
            cell,
            "no revision visible to a valid snapshot"
        );
        if cfg!(debug_assertions) {
            panic!("{cell} chain has no revision visible at {}", self.source);
        }
        StmError::invariant(format!(
            "{} chain has no revision visible at {}",
            cell, self.source
        ))
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target", &self.target.get())
            .field("reads", &self.read_set.len())
            .field("writes", &self.write_set.len())
            .field("conflict", &self.conflict)
            .finish()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            let manager = Arc::clone(&self.manager);
            manager.rollback(self, "dropped while active");
        }
    }
}
