//! Engine error taxonomy
//!
//! | Kind | Variants | Recovery |
//! |------|----------|----------|
//! | Conflict | `WriteConflict` | Retry the whole transaction |
//! | Terminal | `RetriesExhausted` | Surface to caller |
//! | Misuse | `AlreadyActive`, `NotOwner`, `NotActive` | Programmer error, never retried |
//! | Argument | `InvalidArgument` | Fix the input |
//! | Bug | `InvariantViolation` | Engine defect, never swallowed |
//!
//! `Task` carries failures raised by caller code running inside
//! `run_in_transaction`. They abort the transaction and propagate unchanged.

use crate::revision::TransactionStatus;
use thiserror::Error;

/// Errors raised by the transactional memory engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StmError {
    /// A read the transaction depends on is stale
    #[error("write conflict: {reason}")]
    WriteConflict {
        /// What was found to be stale
        reason: String,
    },

    /// `run_in_transaction` used up its retry budget
    #[error("transaction retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made, including the first
        attempts: u32,
    },

    /// The calling thread already has an active transaction
    #[error("a transaction is already active on this thread")]
    AlreadyActive,

    /// The transaction is not the calling thread's active transaction
    #[error("transaction {txn_id} is not the active transaction of the calling thread")]
    NotOwner {
        /// Transaction that was misused
        txn_id: u64,
    },

    /// The transaction has already finished
    #[error("transaction {txn_id} is not active ({status})")]
    NotActive {
        /// Transaction that was misused
        txn_id: u64,
        /// Status it finished with
        status: TransactionStatus,
    },

    /// An argument was rejected at the API boundary
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A revision chain has no revision visible to a valid snapshot
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Failure raised by caller code inside a transaction
    #[error("task failed: {0}")]
    Task(String),
}

/// Result type for engine operations
pub type StmResult<T> = std::result::Result<T, StmError>;

impl StmError {
    /// Build a write conflict
    pub fn write_conflict(reason: impl Into<String>) -> Self {
        StmError::WriteConflict {
            reason: reason.into(),
        }
    }

    /// Build an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        StmError::InvalidArgument(message.into())
    }

    /// Build an invariant violation
    pub fn invariant(message: impl Into<String>) -> Self {
        StmError::InvariantViolation(message.into())
    }

    /// Wrap a caller failure
    pub fn task(message: impl std::fmt::Display) -> Self {
        StmError::Task(message.to_string())
    }

    /// Retryable errors may succeed when the transaction is restarted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StmError::WriteConflict { .. })
    }

    /// Check if this is a write conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StmError::WriteConflict { .. })
    }

    /// Check if this error reports a misuse of the transaction API.
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            StmError::AlreadyActive | StmError::NotOwner { .. } | StmError::NotActive { .. }
        )
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, StmError::InvariantViolation(_))
    }
}
