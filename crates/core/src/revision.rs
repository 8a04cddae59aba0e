//! Revision numbers and revision slots
//!
//! A revision number is a signed integer with three disjoint meanings:
//!
//! | Value | Meaning |
//! |-------|---------|
//! | `0` | Aborted. Never visible to any reader. |
//! | `< 0` | Provisional. Issued to a running transaction by a decreasing counter. |
//! | `> 0` | Committed. Issued in commit order by an increasing counter. |
//!
//! A transaction owns exactly one [`RevisionSlot`]. Every revision node the
//! transaction writes holds a clone of that slot, so stamping the slot once
//! publishes (or retracts) every write of the transaction at the same instant.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A revision number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(i64);

impl Revision {
    /// Revision carried by aborted transactions
    pub const ABORTED: Revision = Revision(0);

    /// Revision of the initial value of every cell
    ///
    /// The committed counter starts here, so genesis revisions are visible
    /// to every snapshot.
    pub const GENESIS: Revision = Revision(1);

    /// Wrap a raw revision number
    pub const fn new(raw: i64) -> Self {
        Revision(raw)
    }

    /// Raw revision number
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// `true` for the aborted sentinel
    pub const fn is_aborted(self) -> bool {
        self.0 == 0
    }

    /// `true` while the writing transaction is still running
    pub const fn is_provisional(self) -> bool {
        self.0 < 0
    }

    /// `true` once the writing transaction has committed
    pub const fn is_committed(self) -> bool {
        self.0 > 0
    }

    /// Whether a reader with snapshot `source` may observe this revision
    pub fn is_visible_at(self, source: Revision) -> bool {
        self.is_committed() && self <= source
    }

    /// Whether this revision committed after the snapshot `source` was taken
    pub fn is_newer_than(self, source: Revision) -> bool {
        self.is_committed() && self > source
    }

    /// Lifecycle status implied by this revision number
    pub fn status(self) -> TransactionStatus {
        match self.0 {
            0 => TransactionStatus::Aborted,
            n if n < 0 => TransactionStatus::Active,
            _ => TransactionStatus::Committed,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            TransactionStatus::Aborted => write!(f, "r0(aborted)"),
            TransactionStatus::Active => write!(f, "r{}(provisional)", self.0),
            TransactionStatus::Committed => write!(f, "r{}", self.0),
        }
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Committed` (validation passed, slot stamped positive)
/// - `Active` → `Aborted` (conflict, error or explicit abort, slot stamped zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Transaction is running, can read and write
    Active,
    /// Transaction committed, its writes are visible to newer snapshots
    Committed,
    /// Transaction aborted, its writes were discarded
    Aborted,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Active => write!(f, "active"),
            TransactionStatus::Committed => write!(f, "committed"),
            TransactionStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Shared, mutable revision number of one transaction
///
/// Cloning a slot shares it. Two slots are the same slot only if they were
/// cloned from one another; equal numbers do not make equal slots.
#[derive(Debug, Clone)]
pub struct RevisionSlot(Arc<AtomicI64>);

impl RevisionSlot {
    /// Create a fresh slot holding `revision`
    pub fn new(revision: Revision) -> Self {
        RevisionSlot(Arc::new(AtomicI64::new(revision.as_i64())))
    }

    /// Current revision held by the slot
    #[inline]
    pub fn get(&self) -> Revision {
        Revision(self.0.load(Ordering::SeqCst))
    }

    /// Overwrite the revision held by the slot
    ///
    /// Every revision node sharing this slot observes the new number at once.
    #[inline]
    pub fn stamp(&self, revision: Revision) {
        self.0.store(revision.as_i64(), Ordering::SeqCst);
    }

    /// Identity comparison
    #[inline]
    pub fn same_as(&self, other: &RevisionSlot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Status implied by the current revision
    pub fn status(&self) -> TransactionStatus {
        self.get().status()
    }
}
