//! Unified error types for strata-stm.
//!
//! This module provides a clean error type that wraps engine errors
//! and presents a consistent interface to users.

use strata_stm_core::StmError;
use thiserror::Error;

/// All strata-stm errors.
///
/// This is the canonical error type for the public API. It folds the
/// engine's fine-grained [`StmError`] into a small, stable set of kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A read the transaction depended on went stale
    #[error("conflict: {0}")]
    Conflict(String),

    /// A retrying run gave up
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
    },

    /// Transaction used from the wrong thread, after finishing, or nested
    #[error("transaction misuse: {0}")]
    Misuse(String),

    /// Invalid input (configuration, arguments)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure raised by caller code inside a transaction
    #[error("task failed: {0}")]
    Task(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for strata-stm operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Retryable errors (conflicts) may succeed on retry with a fresh snapshot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a misuse of the transaction API.
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::Misuse(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Internal(_))
    }
}

// Convert from engine errors
impl From<StmError> for Error {
    fn from(e: StmError) -> Self {
        match e {
            StmError::WriteConflict { reason } => Error::Conflict(reason),
            StmError::RetriesExhausted { attempts } => Error::RetriesExhausted { attempts },
            StmError::AlreadyActive | StmError::NotOwner { .. } | StmError::NotActive { .. } => {
                Error::Misuse(e.to_string())
            }
            StmError::InvalidArgument(msg) => Error::InvalidArgument(msg),
            StmError::InvariantViolation(msg) => Error::Internal(msg),
            StmError::Task(msg) => Error::Task(msg),
        }
    }
}
