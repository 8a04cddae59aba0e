//! Transaction manager for coordinating commit operations
//!
//! Owns all process-wide transaction state:
//! - `last_committed`: increasing counter issuing commit revisions
//! - `last_pending`: decreasing counter issuing provisional revisions
//! - the multiset of source revisions still in use
//! - the active transaction of each thread
//! - the cleanup queue of finished transactions
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Check the caller owns the transaction
//! 2. IF read-only: stamp target with the source revision, skip to 6
//! 3. Acquire commit lock
//! 4. Re-walk every chain in the read set; IF any commit is newer than the
//!    snapshot: release lock, roll back, return WriteConflict
//! 5. Stamp target with last_committed + 1, then advance last_committed
//!    (VISIBILITY POINT: every revision the transaction wrote shares the slot)
//! 6. Release the snapshot, enqueue for cleanup, run a cleanup pass
//! 7. Return the commit revision
//! ```
//!
//! Reads never take the commit lock. The only blocking section is steps 3-5.

use crate::gc::{CleanupQueue, CollectionReport, Finished};
use crate::metrics::{MetricsRecorder, TransactionMetrics};
use crate::snapshot::SourceRevisions;
use crate::transaction::Transaction;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use strata_stm_core::{Revision, RetryConfig, StmError, StmResult};
use tracing::{debug, warn};

static GLOBAL: Lazy<TransactionManager> = Lazy::new(TransactionManager::new);

/// Shared state behind a [`TransactionManager`]
pub(crate) struct ManagerState {
    /// Revision of the most recent commit
    ///
    /// Monotonically increasing. Starts at the genesis revision.
    last_committed: AtomicI64,

    /// Most recently issued provisional revision
    ///
    /// Monotonically decreasing, so every running transaction holds a
    /// distinct negative number.
    last_pending: AtomicI64,

    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// Snapshots relied upon by live transactions
    sources: SourceRevisions,

    /// Active transaction ID per thread
    active: DashMap<ThreadId, u64>,

    /// Commit serialization lock
    ///
    /// Prevents a TOCTOU race between validation and stamping. Without it:
    /// 1. T1 validates (no newer commit on its reads)
    /// 2. T2 validates (no newer commit on its reads)
    /// 3. T1 stamps, invalidating a read of T2
    /// 4. T2 stamps using its stale validation
    commit_lock: Mutex<()>,

    /// Finished transactions awaiting collection
    cleanup: CleanupQueue,

    pub(crate) metrics: MetricsRecorder,

    retry: RetryConfig,
}

impl ManagerState {
    fn new(retry: RetryConfig) -> Self {
        ManagerState {
            last_committed: AtomicI64::new(Revision::GENESIS.as_i64()),
            last_pending: AtomicI64::new(0),
            next_txn_id: AtomicU64::new(1),
            sources: SourceRevisions::new(),
            active: DashMap::new(),
            commit_lock: Mutex::new(()),
            cleanup: CleanupQueue::new(),
            metrics: MetricsRecorder::default(),
            retry,
        }
    }

    fn last_committed(&self) -> Revision {
        Revision::new(self.last_committed.load(Ordering::SeqCst))
    }

    /// Register a snapshot without a window in which a commit can slip by
    ///
    /// Read the committed counter, register it, read it again. If a commit
    /// happened in between, the registration may have come too late to stop
    /// cleanup from consolidating past it, so withdraw and retry.
    fn acquire_snapshot(&self) -> Revision {
        loop {
            let observed = self.last_committed();
            self.sources.register(observed);
            if self.last_committed() == observed {
                return observed;
            }
            self.sources.release(observed);
            std::hint::spin_loop();
        }
    }

    /// Oldest revision any live transaction may still read
    ///
    /// The committed counter is read before the in-use minimum; a snapshot
    /// registered after that read is re-validated by `acquire_snapshot`.
    fn horizon(&self) -> Revision {
        let committed = self.last_committed();
        match self.sources.oldest() {
            Some(oldest) => oldest.min(committed),
            None => committed,
        }
    }

    /// Validate the read set and publish every write at once
    fn validate_and_stamp(&self, txn: &Transaction) -> StmResult<Revision> {
        let _commit_guard = self.commit_lock.lock();

        if !txn.reads_are_current() {
            return Err(StmError::write_conflict(format!(
                "transaction {} read a cell that changed after snapshot {}",
                txn.id(),
                txn.source_revision()
            )));
        }

        let revision = Revision::new(self.last_committed.load(Ordering::SeqCst) + 1);
        // Stamp before advancing the counter: a snapshot taken at `revision`
        // must already see every write of this transaction.
        txn.target().stamp(revision);
        self.last_committed
            .store(revision.as_i64(), Ordering::SeqCst);
        Ok(revision)
    }

    /// Abort `txn` and discard every revision it wrote
    pub(crate) fn rollback(&self, txn: &mut Transaction, reason: &str) {
        txn.target().stamp(Revision::ABORTED);
        let writes = txn.take_writes();
        for cell in &writes {
            cell.discard(txn.target());
        }
        self.metrics.record_abort();
        debug!(
            txn_id = txn.id(),
            source_revision = %txn.source_revision(),
            writes = writes.len(),
            reason,
            "transaction aborted"
        );
        self.finish(txn, Vec::new());
    }

    /// Release the snapshot, enqueue for cleanup and collect
    fn finish(&self, txn: &mut Transaction, writes: Vec<Arc<dyn crate::chain::Versioned>>) {
        txn.clear_reads();
        self.active
            .remove_if(&txn.owner(), |_, active| *active == txn.id());
        self.sources.release(txn.source_revision());
        self.cleanup
            .push(Finished::new(txn.id(), txn.target().clone(), writes));
        self.collect();
    }

    fn collect(&self) -> Option<CollectionReport> {
        let report = self.cleanup.collect(self.horizon())?;
        self.metrics
            .record_reclaimed(report.transactions, report.revisions);
        Some(report)
    }
}

/// Manages transaction lifecycle and atomic commits
///
/// TransactionManager coordinates the commit protocol:
/// - Snapshot registration at begin
/// - Validation of the read set against newer commits
/// - Publication of all writes through a single revision stamp
/// - Rollback and garbage collection of finished transactions
///
/// Cloning a manager shares its state. Cells carry no reference to a
/// manager; a cell must only ever be used with transactions of one manager.
///
/// # Thread Safety
///
/// Each thread may have at most one active transaction. Commit is serialized
/// via an internal lock; reads and writes are not.
#[derive(Clone)]
pub struct TransactionManager {
    state: Arc<ManagerState>,
}

impl TransactionManager {
    /// Create a new transaction manager with the default retry policy
    pub fn new() -> Self {
        Self::with_retry_config(RetryConfig::default())
    }

    /// Create a builder for manager configuration
    pub fn builder() -> TransactionManagerBuilder {
        TransactionManagerBuilder::new()
    }

    fn with_retry_config(retry: RetryConfig) -> Self {
        TransactionManager {
            state: Arc::new(ManagerState::new(retry)),
        }
    }

    /// Process-wide manager, created on first use
    pub fn global() -> &'static TransactionManager {
        &GLOBAL
    }

    /// Revision of the most recent commit
    pub fn last_committed(&self) -> Revision {
        self.state.last_committed()
    }

    /// Oldest snapshot held by a live transaction
    pub fn oldest_source_in_use(&self) -> Option<Revision> {
        self.state.sources.oldest()
    }

    /// Default retry policy used by [`TransactionManager::transaction`]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.state.retry
    }

    /// Point-in-time transaction counters
    pub fn metrics(&self) -> TransactionMetrics {
        self.state.metrics.snapshot(
            self.state.active.len() as u64,
            self.state.cleanup.len() as u64,
        )
    }

    /// Begin a transaction on the calling thread
    ///
    /// # Errors
    /// `AlreadyActive` if the calling thread already has an active transaction.
    pub fn begin(&self) -> StmResult<Transaction> {
        let txn_id = self.state.next_txn_id.fetch_add(1, Ordering::SeqCst);
        match self.state.active.entry(thread::current().id()) {
            Entry::Occupied(_) => return Err(StmError::AlreadyActive),
            Entry::Vacant(slot) => {
                slot.insert(txn_id);
            }
        }

        let source = self.state.acquire_snapshot();
        let target = Revision::new(self.state.last_pending.fetch_sub(1, Ordering::SeqCst) - 1);
        debug!(txn_id, source_revision = %source, target_revision = %target, "transaction started");
        Ok(Transaction::new(
            txn_id,
            source,
            target,
            Arc::clone(&self.state),
        ))
    }

    /// Commit a transaction atomically
    ///
    /// # Returns
    /// - `Ok(revision)` on success; read-only transactions return their snapshot
    /// - `Err(WriteConflict)` if a read went stale; the transaction is rolled back
    /// - `Err(NotOwner | NotActive)` on misuse; the transaction is left untouched
    pub fn commit(&self, txn: &mut Transaction) -> StmResult<Revision> {
        self.ensure_owner(txn)?;

        if txn.is_read_only() {
            txn.target().stamp(txn.source_revision());
            self.state.metrics.record_commit();
            debug!(txn_id = txn.id(), revision = %txn.source_revision(), "read-only transaction committed");
            self.state.finish(txn, Vec::new());
            return Ok(txn.source_revision());
        }

        match self.state.validate_and_stamp(txn) {
            Ok(revision) => {
                let writes = txn.take_writes();
                self.state.metrics.record_commit();
                debug!(
                    txn_id = txn.id(),
                    revision = %revision,
                    writes = writes.len(),
                    elapsed_us = txn.elapsed().as_micros() as u64,
                    "transaction committed"
                );
                self.state.finish(txn, writes);
                Ok(revision)
            }
            Err(err) => {
                self.state.metrics.record_conflict();
                self.state.rollback(txn, "validation failed");
                Err(err)
            }
        }
    }

    /// Explicitly abort a transaction
    ///
    /// Every revision the transaction wrote is unlinked from its chain.
    pub fn abort(&self, txn: &mut Transaction) -> StmResult<()> {
        self.ensure_owner(txn)?;
        self.state.rollback(txn, "explicit abort");
        Ok(())
    }

    /// Run `task` in a transaction, retrying up to `max_retries` times on conflict
    ///
    /// Uses the manager's backoff delays with the given retry budget.
    pub fn run_in_transaction<R, F>(&self, max_retries: u32, task: F) -> StmResult<R>
    where
        F: FnMut(&mut Transaction) -> StmResult<R>,
    {
        let config = self.state.retry.clone().with_max_retries(max_retries);
        self.run_with_config(&config, task)
    }

    /// Run `task` with the manager's default retry policy
    pub fn transaction<R, F>(&self, task: F) -> StmResult<R>
    where
        F: FnMut(&mut Transaction) -> StmResult<R>,
    {
        let config = self.state.retry.clone();
        self.run_with_config(&config, task)
    }

    /// Run `task` in a fresh transaction per attempt
    ///
    /// ## Purity Requirement
    ///
    /// The closure MAY BE CALLED MULTIPLE TIMES. Only writes to versioned
    /// cells are rolled back on conflict; any other side effect repeats.
    ///
    /// ## Error Handling
    ///
    /// - `WriteConflict` (from the task or from commit): roll back, back off, retry
    /// - after `max_retries` retries: `RetriesExhausted`
    /// - any other error: roll back and return it immediately
    pub fn run_with_config<R, F>(&self, config: &RetryConfig, mut task: F) -> StmResult<R>
    where
        F: FnMut(&mut Transaction) -> StmResult<R>,
    {
        let attempts = config.max_attempts();
        for attempt in 0..attempts {
            let mut txn = self.begin()?;
            let outcome = task(&mut txn).and_then(|value| {
                self.commit(&mut txn)?;
                Ok(value)
            });

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if txn.is_active() {
                self.abort(&mut txn)?;
            }
            if !err.is_retryable() {
                return Err(err);
            }

            if attempt + 1 < attempts {
                self.state.metrics.record_retry();
                let delay = config.backoff(attempt);
                debug!(
                    txn_id = txn.id(),
                    attempt,
                    delay_us = delay.as_micros() as u64,
                    "retrying conflicting transaction"
                );
                drop(txn);
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }

        warn!(attempts, "transaction retries exhausted");
        Err(StmError::RetriesExhausted { attempts })
    }

    /// Run a cleanup pass now
    ///
    /// Returns `None` if another thread was already collecting.
    pub fn collect(&self) -> Option<CollectionReport> {
        self.state.collect()
    }

    fn ensure_owner(&self, txn: &Transaction) -> StmResult<()> {
        if !txn.is_active() {
            return Err(StmError::NotActive {
                txn_id: txn.id(),
                status: txn.status(),
            });
        }
        let owned = Arc::ptr_eq(&self.state, &txn.manager)
            && self
                .state
                .active
                .get(&thread::current().id())
                .is_some_and(|active| *active == txn.id());
        if !owned {
            return Err(StmError::NotOwner { txn_id: txn.id() });
        }
        Ok(())
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("last_committed", &self.last_committed())
            .field("active", &self.state.active.len())
            .field("snapshots_in_use", &self.state.sources.len())
            .field("pending_cleanup", &self.state.cleanup.len())
            .finish()
    }
}

/// Builder for manager configuration
///
/// # Example
///
/// ```
/// use strata_stm_concurrency::{RetryConfig, TransactionManager};
///
/// let manager = TransactionManager::builder()
///     .retry(RetryConfig::default().with_max_retries(50))
///     .build()
///     .unwrap();
/// assert_eq!(manager.retry_config().max_retries, 50);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransactionManagerBuilder {
    retry: RetryConfig,
}

impl TransactionManagerBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default retry policy
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the default retry budget
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Build the manager
    ///
    /// # Errors
    /// `InvalidArgument` if the retry policy is inconsistent.
    pub fn build(self) -> StmResult<TransactionManager> {
        self.retry.validate()?;
        Ok(TransactionManager::with_retry_config(self.retry))
    }
}
