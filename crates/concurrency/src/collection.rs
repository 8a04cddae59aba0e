//! Collection versioned cells
//!
//! A collection cell stores deltas rather than whole values: each revision
//! records the items its transaction added and removed. The visible
//! collection is rebuilt by replaying every visible delta oldest first,
//! additions before removals. Garbage collection folds settled history into
//! a single absolute delta, bounding the replay depth.
//!
//! Two container flavors share the implementation:
//! - [`CellSet`]: unordered, duplicate-free (`FxHashSet`)
//! - [`CellSeq`]: ordered, duplicates allowed (`Vec`); `remove` deletes the
//!   earliest occurrence

use crate::chain::{Chain, Deltas, Versioned};
use crate::delta::{Collection, Delta};
use crate::transaction::Transaction;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;
use strata_stm_core::StmResult;

/// Transactional set
pub type CellSet<T> = CollectionCell<FxHashSet<T>>;

/// Transactional sequence
pub type CellSeq<T> = CollectionCell<Vec<T>>;

/// A transactional collection built from per-revision deltas
pub struct CollectionCell<C: Collection> {
    chain: Arc<Chain<Deltas<C>>>,
}

impl<C: Collection> CollectionCell<C> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::with_items(C::default())
    }

    /// Create a collection whose initial items are visible to every snapshot
    pub fn with_items(items: C) -> Self {
        CollectionCell {
            chain: Arc::new(Chain::genesis(Delta::absolute(items))),
        }
    }

    /// Rebuild the collection visible to `txn`
    pub fn get(&self, txn: &mut Transaction) -> StmResult<C> {
        txn.ensure_usable()?;
        let read = self.chain.read(txn.view());
        txn.observe(self.handle(), read.newer_committed, read.own_write);
        read.value.ok_or_else(|| txn.invariant_violation("collection"))
    }

    /// Stage the addition of `item`
    pub fn add(&self, txn: &mut Transaction, item: C::Item) -> StmResult<()> {
        txn.ensure_writable()?;
        self.stage(txn, |delta| delta.add(item));
        Ok(())
    }

    /// Stage the removal of `item`
    ///
    /// Returns `false` without writing anything if `item` is not in the
    /// collection visible to `txn`.
    pub fn remove(&self, txn: &mut Transaction, item: &C::Item) -> StmResult<bool> {
        txn.ensure_writable()?;
        if !self.get(txn)?.contains_item(item) {
            return Ok(false);
        }
        // The read above may have raised the conflict flag.
        txn.ensure_writable()?;
        let item = item.clone();
        self.stage(txn, |delta| delta.remove(item));
        Ok(true)
    }

    /// Whether `item` is visible to `txn`
    pub fn contains(&self, txn: &mut Transaction, item: &C::Item) -> StmResult<bool> {
        Ok(self.get(txn)?.contains_item(item))
    }

    /// Number of items visible to `txn`
    pub fn len(&self, txn: &mut Transaction) -> StmResult<usize> {
        Ok(self.get(txn)?.item_count())
    }

    /// Whether the collection visible to `txn` is empty
    pub fn is_empty(&self, txn: &mut Transaction) -> StmResult<bool> {
        Ok(self.len(txn)? == 0)
    }

    /// Number of revisions currently retained
    pub fn chain_len(&self) -> usize {
        self.chain.len()
    }

    fn stage(&self, txn: &mut Transaction, apply: impl FnOnce(&mut Delta<C>)) {
        match self.chain.find_own(txn.target()) {
            Some(node) => node.edit(apply),
            None => {
                let mut delta = Delta::default();
                apply(&mut delta);
                self.chain.prepend(txn.target().clone(), delta);
                txn.record_write(self.handle());
            }
        }
    }

    fn handle(&self) -> Arc<dyn Versioned> {
        self.chain.clone()
    }
}

impl<C: Collection> Default for CollectionCell<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Collection> Clone for CollectionCell<C> {
    fn clone(&self) -> Self {
        CollectionCell {
            chain: Arc::clone(&self.chain),
        }
    }
}

impl<C: Collection> fmt::Debug for CollectionCell<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionCell")
            .field("revisions", &self.chain.len())
            .finish()
    }
}
