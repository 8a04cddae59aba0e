//! # strata-stm
//!
//! In-process software transactional memory with multi-version optimistic
//! concurrency control.
//!
//! Shared state lives in versioned cells. Every cell keeps a short chain of
//! revisions, so readers work against a consistent snapshot without taking
//! locks, and writers are validated at commit time.
//!
//! ## Quick Start
//!
//! ```
//! use strata_stm::prelude::*;
//!
//! let from = Cell::new(100i64);
//! let to = Cell::new(0i64);
//!
//! // Moves are atomic: no snapshot sees the debit without the credit
//! atomically(|txn| {
//!     from.modify(txn, |b| b - 40)?;
//!     to.modify(txn, |b| b + 40)?;
//!     Ok(())
//! })?;
//!
//! let total = atomically(|txn| Ok(from.get(txn)? + to.get(txn)?))?;
//! assert_eq!(total, 100);
//! # Ok::<(), strata_stm::Error>(())
//! ```
//!
//! ## Cells
//!
//! - [`Cell`] - a single value, replaced on every write
//! - [`CellSet`] - an unordered set, stored as add/remove deltas
//! - [`CellSeq`] - an ordered sequence, stored as add/remove deltas
//!
//! ## Explicit Transactions
//!
//! [`TransactionManager::begin`] returns a [`Transaction`] that must be
//! committed or aborted on the thread that began it. Retrying entry points
//! ([`atomically`], [`run_in_transaction`]) handle begin, commit and retry on
//! write conflicts.

#![warn(missing_docs)]

mod error;

pub mod prelude;

pub use error::{Error, Result};

pub use strata_stm_concurrency::{
    Cell, CellSeq, CellSet, Collection, CollectionCell, CollectionReport, Delta, Transaction,
    TransactionManager, TransactionManagerBuilder, TransactionMetrics,
};
pub use strata_stm_core::{
    RetryConfig, Revision, StmError, StmResult, TransactionStatus,
};

/// Run `task` on the process-wide manager with its default retry policy
///
/// The closure may run more than once; only cell writes are rolled back
/// between attempts.
pub fn atomically<R, F>(task: F) -> Result<R>
where
    F: FnMut(&mut Transaction) -> StmResult<R>,
{
    TransactionManager::global()
        .transaction(task)
        .map_err(surface)
}

/// Run `task` on the process-wide manager, retrying up to `max_retries`
/// times on write conflict
pub fn run_in_transaction<R, F>(max_retries: u32, task: F) -> Result<R>
where
    F: FnMut(&mut Transaction) -> StmResult<R>,
{
    TransactionManager::global()
        .run_in_transaction(max_retries, task)
        .map_err(surface)
}

fn surface(err: StmError) -> Error {
    if err.is_serious() {
        tracing::error!(error = %err, "transaction failed");
    }
    Error::from(err)
}
