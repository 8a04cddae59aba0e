//! Multi-version optimistic concurrency for strata-stm
//!
//! This crate implements software transactional memory with:
//! - Revision chains: per-cell version history, resolved in commit order
//! - Snapshot reads that never block
//! - Read-set validation at commit time, fail-fast on stale reads
//! - Atomic multi-cell commit through a shared revision slot
//! - Inline garbage collection bounded by the oldest live snapshot
//!
//! Scalar values live in [`Cell`]; collections live in [`CellSet`] and
//! [`CellSeq`]. All access goes through a [`Transaction`] obtained from a
//! [`TransactionManager`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
mod chain;
pub mod collection;
pub mod delta;
mod gc;
pub mod manager;
mod metrics;
mod snapshot;
pub mod transaction;

pub use cell::Cell;
pub use collection::{CellSeq, CellSet, CollectionCell};
pub use delta::{Collection, Delta};
pub use gc::CollectionReport;
pub use manager::{TransactionManager, TransactionManagerBuilder};
pub use metrics::TransactionMetrics;
pub use transaction::Transaction;

pub use strata_stm_core::{
    RetryConfig, Revision, RevisionSlot, StmError, StmResult, TransactionStatus,
};
