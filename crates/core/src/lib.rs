//! Core types for strata-stm
//!
//! This crate holds the vocabulary shared by every layer of the engine:
//! - Revision numbers and the shared revision slot a transaction stamps on commit
//! - Transaction status derived from that slot
//! - The engine error taxonomy (`StmError`)
//! - Retry configuration for `run_in_transaction`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod retry;
pub mod revision;

pub use error::{StmError, StmResult};
pub use retry::RetryConfig;
pub use revision::{Revision, RevisionSlot, TransactionStatus};
