//! Scalar versioned cells

use crate::chain::{Absolute, Chain, Versioned};
use crate::transaction::Transaction;
use std::fmt;
use std::sync::Arc;
use strata_stm_core::StmResult;

/// A transactional variable holding a single value
///
/// Every write prepends a revision carrying the whole value. Cloning a cell
/// yields another handle to the same chain.
///
/// # Example
///
/// ```
/// use strata_stm_concurrency::{Cell, TransactionManager};
///
/// let manager = TransactionManager::new();
/// let balance = Cell::new(100u64);
///
/// manager
///     .run_in_transaction(5, |txn| balance.modify(txn, |b| b - 30))
///     .unwrap();
///
/// let mut txn = manager.begin().unwrap();
/// assert_eq!(balance.get(&mut txn).unwrap(), 70);
/// ```
pub struct Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    chain: Arc<Chain<Absolute<T>>>,
}

impl<T> Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a cell whose initial value is visible to every snapshot
    pub fn new(initial: T) -> Self {
        Cell {
            chain: Arc::new(Chain::genesis(initial)),
        }
    }

    /// Read the value visible to `txn`
    pub fn get(&self, txn: &mut Transaction) -> StmResult<T> {
        txn.ensure_usable()?;
        let read = self.chain.read(txn.view());
        txn.observe(self.handle(), read.newer_committed, read.own_write);
        read.value.ok_or_else(|| txn.invariant_violation("scalar"))
    }

    /// Write `value` as part of `txn`
    ///
    /// A second write by the same transaction replaces the first in place.
    ///
    /// # Errors
    /// `WriteConflict` if `txn` has already read a revision committed after
    /// its snapshot.
    pub fn set(&self, txn: &mut Transaction, value: T) -> StmResult<()> {
        txn.ensure_writable()?;
        match self.chain.find_own(txn.target()) {
            Some(node) => node.edit(|current| *current = value),
            None => {
                self.chain.prepend(txn.target().clone(), value);
                txn.record_write(self.handle());
            }
        }
        Ok(())
    }

    /// Read, transform and write back; returns the new value
    pub fn modify<F>(&self, txn: &mut Transaction, f: F) -> StmResult<T>
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.get(txn)?);
        self.set(txn, next.clone())?;
        Ok(next)
    }

    /// Number of revisions currently retained
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    fn handle(&self) -> Arc<dyn Versioned> {
        self.chain.clone()
    }
}

impl<T> Clone for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Cell {
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<T: Default + Clone + Send + Sync + 'static> Default for Cell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("revisions", &self.chain.len())
            .finish()
    }
}
