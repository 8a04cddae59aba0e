//! Convenient imports for strata-stm.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```
//! use strata_stm::prelude::*;
//!
//! let counter = Cell::new(0u64);
//! atomically(|txn| counter.modify(txn, |n| n + 1))?;
//! # Ok::<(), strata_stm::Error>(())
//! ```

// Entry points
pub use crate::{atomically, run_in_transaction};
pub use strata_stm_concurrency::{Transaction, TransactionManager};

// Error handling
pub use crate::error::{Error, Result};
pub use strata_stm_core::{StmError, StmResult};

// Cells
pub use strata_stm_concurrency::{Cell, CellSeq, CellSet};

// Configuration
pub use strata_stm_core::RetryConfig;
