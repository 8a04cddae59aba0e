//! Source revisions in use
//!
//! A multiset of the snapshots live transactions read from. Its minimum is
//! the oldest revision any reader may still need, which bounds how far the
//! garbage collector may consolidate revision chains.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use strata_stm_core::Revision;

/// Multiset of snapshot revisions relied upon by live transactions
#[derive(Debug, Default)]
pub(crate) struct SourceRevisions {
    in_use: Mutex<BTreeMap<Revision, usize>>,
}

impl SourceRevisions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record one more reader of `revision`
    pub(crate) fn register(&self, revision: Revision) {
        *self.in_use.lock().entry(revision).or_insert(0) += 1;
    }

    /// Drop one reader of `revision`
    pub(crate) fn release(&self, revision: Revision) {
        let mut in_use = self.in_use.lock();
        if let Some(count) = in_use.get_mut(&revision) {
            *count -= 1;
            if *count == 0 {
                in_use.remove(&revision);
            }
        }
    }

    /// Oldest snapshot still in use
    pub(crate) fn oldest(&self) -> Option<Revision> {
        self.in_use.lock().keys().next().copied()
    }

    /// Total number of registered readers
    pub(crate) fn len(&self) -> usize {
        self.in_use.lock().values().sum()
    }
}
