//! Revision chains
//!
//! Every versioned cell owns one chain: a singly linked list of revision
//! nodes, most recently prepended first. Each node carries the
//! [`RevisionSlot`] of the transaction that wrote it plus a payload whose
//! meaning depends on the [`Merge`] strategy of the cell:
//!
//! - [`Absolute`]: the payload is the whole value (scalar cells)
//! - [`Deltas`]: the payload is a [`Delta`] relative to older nodes (collections)
//!
//! # Ordering
//!
//! Chains are search structures, not sorted lists: a node committed later
//! may sit behind one committed earlier when two writers interleave. Readers
//! therefore order what they find by revision number, never by position.
//!
//! # Concurrency
//!
//! - Reads walk the chain through `ArcSwapOption` loads and never block.
//! - Prepending a node is a compare-and-swap loop on the head pointer.
//! - Unlinking an aborted node and consolidating history rewrite interior
//!   links, so they are serialized per chain by `relink`. Prepends never
//!   touch interior links and proceed concurrently with both.
//! - A node's payload is only mutated by the transaction owning its slot,
//!   while that slot is still provisional. Other readers skip such nodes.

use crate::delta::{replay_oldest_first, Collection, Delta};
use arc_swap::ArcSwapOption;
use parking_lot::{Mutex, RwLock};
use std::marker::PhantomData;
use std::sync::Arc;
use strata_stm_core::{Revision, RevisionSlot};

/// How the payloads of a chain combine into the value a reader sees
pub trait Merge: Send + Sync + 'static {
    /// What one revision node stores
    type Payload: Send + Sync + 'static;
    /// What a reader gets back
    type Value;

    /// `true` when a payload is relative to older nodes
    const INCREMENTAL: bool;

    /// Rebuild the value from the visible payloads in ascending revision order
    ///
    /// The slice is never empty. A reader's own write, if any, comes last.
    fn resolve(oldest_first: &[&Self::Payload]) -> Self::Value;

    /// Fold settled payloads (ascending revision order) into one node
    fn settle(oldest_first: &[&Self::Payload]) -> Self::Payload;
}

/// Scalar strategy: every node holds the full value
pub struct Absolute<T>(PhantomData<fn() -> T>);

impl<T: Clone + Send + Sync + 'static> Merge for Absolute<T> {
    type Payload = T;
    type Value = T;

    const INCREMENTAL: bool = false;

    fn resolve(oldest_first: &[&T]) -> T {
        Self::settle(oldest_first)
    }

    fn settle(oldest_first: &[&T]) -> T {
        let newest = oldest_first.len() - 1;
        oldest_first[newest].clone()
    }
}

/// Collection strategy: every node holds added/removed changes
pub struct Deltas<C>(PhantomData<fn() -> C>);

impl<C: Collection> Merge for Deltas<C> {
    type Payload = Delta<C>;
    type Value = C;

    const INCREMENTAL: bool = true;

    fn resolve(oldest_first: &[&Delta<C>]) -> C {
        replay_oldest_first(oldest_first.iter().copied())
    }

    fn settle(oldest_first: &[&Delta<C>]) -> Delta<C> {
        Delta::absolute(replay_oldest_first(oldest_first.iter().copied()))
    }
}

/// One revision of a cell
pub(crate) struct RevisionNode<P> {
    slot: RevisionSlot,
    payload: RwLock<P>,
    prior: ArcSwapOption<RevisionNode<P>>,
}

impl<P> RevisionNode<P> {
    fn new(slot: RevisionSlot, payload: P) -> Self {
        RevisionNode {
            slot,
            payload: RwLock::new(payload),
            prior: ArcSwapOption::empty(),
        }
    }

    pub(crate) fn revision(&self) -> Revision {
        self.slot.get()
    }

    /// Mutate the payload in place
    pub(crate) fn edit<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.payload.write())
    }
}

/// The transaction-side parameters of a chain walk
#[derive(Clone, Copy)]
pub(crate) struct ReadView<'a> {
    pub source: Revision,
    pub target: &'a RevisionSlot,
}

/// Outcome of a chain walk
pub(crate) struct ChainRead<V> {
    /// Resolved value, `None` if no node was visible
    pub value: Option<V>,
    /// A revision committed after the reader's snapshot was passed over
    pub newer_committed: bool,
    /// The value came from the reader's own write
    pub own_write: bool,
}

/// Revision chain of a single cell
pub(crate) struct Chain<M: Merge> {
    head: ArcSwapOption<RevisionNode<M::Payload>>,
    relink: Mutex<()>,
}

type Link<P> = Option<Arc<RevisionNode<P>>>;

fn same_link<P>(a: &Link<P>, b: &Link<P>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

impl<M: Merge> Chain<M> {
    /// Chain holding a single genesis revision
    pub(crate) fn genesis(payload: M::Payload) -> Self {
        let node = RevisionNode::new(RevisionSlot::new(Revision::GENESIS), payload);
        Chain {
            head: ArcSwapOption::from_pointee(node),
            relink: Mutex::new(()),
        }
    }

    /// Walk the chain for `view`
    ///
    /// Collects every node committed at or before the snapshot plus the
    /// reader's own node, orders them by revision with the own node last and
    /// resolves them. A scalar read needs only the newest of them; a scalar
    /// own write ends the walk.
    pub(crate) fn read(&self, view: ReadView<'_>) -> ChainRead<M::Value> {
        let mut newer_committed = false;
        let mut own = None;
        let mut visible = Vec::new();

        let mut cursor = self.head.load_full();
        while let Some(node) = cursor {
            cursor = node.prior.load_full();
            if node.slot.same_as(view.target) {
                own = Some(node);
                if !M::INCREMENTAL {
                    break;
                }
                continue;
            }
            let revision = node.revision();
            if revision.is_newer_than(view.source) {
                newer_committed = true;
            } else if revision.is_visible_at(view.source) {
                visible.push((revision, node));
            }
        }

        let own_write = own.is_some();
        let mut ordered = Vec::new();
        if M::INCREMENTAL || own.is_none() {
            // Stable: equal revisions keep chain order, so a folded node
            // (always furthest back) replays after the node it absorbed.
            visible.sort_by_key(|(revision, _)| *revision);
            let nodes = visible.into_iter().map(|(_, node)| node);
            if M::INCREMENTAL {
                ordered.extend(nodes);
            } else {
                ordered.extend(nodes.last());
            }
        }
        ordered.extend(own);

        let value = if ordered.is_empty() {
            None
        } else {
            let guards: Vec<_> = ordered.iter().map(|node| node.payload.read()).collect();
            let payloads: Vec<&M::Payload> = guards.iter().map(|guard| &**guard).collect();
            Some(M::resolve(&payloads))
        };

        ChainRead {
            value,
            newer_committed,
            // A collection read through an own write still depends on others
            own_write: own_write && !M::INCREMENTAL,
        }
    }

    /// The node written by the transaction owning `target`, if any
    pub(crate) fn find_own(&self, target: &RevisionSlot) -> Option<Arc<RevisionNode<M::Payload>>> {
        let mut cursor = self.head.load_full();
        while let Some(node) = cursor {
            if node.slot.same_as(target) {
                return Some(node);
            }
            cursor = node.prior.load_full();
        }
        None
    }

    /// Publish a new node at the head
    pub(crate) fn prepend(&self, slot: RevisionSlot, payload: M::Payload) {
        let node = Arc::new(RevisionNode::new(slot, payload));
        loop {
            let current = self.head.load_full();
            node.prior.store(current.clone());
            let previous = self
                .head
                .compare_and_swap(&current, Some(Arc::clone(&node)));
            if same_link(&*previous, &current) {
                return;
            }
            std::hint::spin_loop();
        }
    }

    /// Remove the node carrying `target`; returns whether one was found
    pub(crate) fn unlink(&self, target: &RevisionSlot) -> bool {
        let _guard = self.relink.lock();
        loop {
            let Some(head) = self.head.load_full() else {
                return false;
            };
            if head.slot.same_as(target) {
                let replacement = head.prior.load_full();
                let expected = Some(Arc::clone(&head));
                let previous = self.head.compare_and_swap(&expected, replacement);
                if same_link(&*previous, &expected) {
                    return true;
                }
                // A writer prepended concurrently; the node is no longer at the head.
                continue;
            }

            let mut predecessor = head;
            let mut cursor = predecessor.prior.load_full();
            while let Some(node) = cursor {
                if node.slot.same_as(target) {
                    predecessor.prior.store(node.prior.load_full());
                    return true;
                }
                cursor = node.prior.load_full();
                predecessor = node;
            }
            return false;
        }
    }

    /// Whether any node committed after `source`
    pub(crate) fn has_commit_after(&self, source: Revision) -> bool {
        let mut cursor = self.head.load_full();
        while let Some(node) = cursor {
            if node.revision().is_newer_than(source) {
                return true;
            }
            cursor = node.prior.load_full();
        }
        false
    }

    /// Fold settled history into a single node
    ///
    /// Runs on behalf of the transaction owning `target`, once its revision
    /// is at or below `horizon`. Nodes committed at or below `horizon` are
    /// settled: every live snapshot sees all of them. They are folded, in
    /// revision order, into one node stamped with the highest settled
    /// revision, which replaces everything behind the last unsettled node
    /// (provisional, or committed above the horizon) in one pointer store.
    /// Settled nodes ahead of that point stay linked; the folded node
    /// already covers them, and readers order by revision, so a reader sees
    /// the same value before and after.
    ///
    /// Returns the number of nodes removed from the chain.
    pub(crate) fn consolidate(&self, target: &RevisionSlot, horizon: Revision) -> usize {
        let _guard = self.relink.lock();

        let Some(anchor) = self.find_own(target) else {
            return 0;
        };
        if !anchor.revision().is_visible_at(horizon) {
            return 0;
        }

        let first = self.head.load_full();
        let mut settled = Vec::new();
        let mut last_unsettled = None;
        let mut tail = Vec::new();
        let mut cursor = first.clone();
        while let Some(node) = cursor {
            cursor = node.prior.load_full();
            let revision = node.revision();
            if revision.is_committed() && revision.is_visible_at(horizon) {
                settled.push((revision, Arc::clone(&node)));
                tail.push(node);
            } else if revision.is_aborted() {
                tail.push(node);
            } else {
                last_unsettled = Some(node);
                tail.clear();
            }
        }

        if tail.is_empty() || (tail.len() == 1 && tail[0].revision().is_committed()) {
            return 0;
        }

        // Stable sort keeps an earlier fold behind the nodes it absorbed.
        settled.sort_by_key(|(revision, _)| *revision);
        let Some(&(newest, _)) = settled.last() else {
            return 0;
        };
        let folded = {
            let guards: Vec<_> = settled.iter().map(|(_, node)| node.payload.read()).collect();
            let payloads: Vec<&M::Payload> = guards.iter().map(|guard| &**guard).collect();
            Arc::new(RevisionNode::new(
                RevisionSlot::new(newest),
                M::settle(&payloads),
            ))
        };

        let removed = tail.len();
        match last_unsettled {
            Some(node) => node.prior.store(Some(folded)),
            None => self.replace_from_head(first, folded),
        }
        tracing::trace!(
            target_revision = %anchor.revision(),
            horizon = %horizon,
            folded_revision = %newest,
            removed,
            "consolidated revision chain"
        );
        removed - 1
    }

    /// Replace the whole chain starting at `first` with `folded`
    ///
    /// Writers may have prepended in front of `first` since it was loaded;
    /// in that case the newest such node is relinked instead of the head.
    fn replace_from_head(&self, first: Link<M::Payload>, folded: Arc<RevisionNode<M::Payload>>) {
        let previous = self
            .head
            .compare_and_swap(&first, Some(Arc::clone(&folded)));
        if same_link(&*previous, &first) {
            return;
        }

        let mut cursor = self.head.load_full();
        while let Some(node) = cursor {
            let prior = node.prior.load_full();
            if same_link(&prior, &first) {
                node.prior.store(Some(folded));
                return;
            }
            cursor = prior;
        }
    }

    /// Number of nodes currently linked
    pub(crate) fn len(&self) -> usize {
        let mut count = 0;
        let mut cursor = self.head.load_full();
        while let Some(node) = cursor {
            count += 1;
            cursor = node.prior.load_full();
        }
        count
    }

    /// Drop every node, leaving a chain no snapshot can read
    #[cfg(test)]
    pub(crate) fn clear(&self) {
        self.head.store(None);
    }
}

/// Type-erased chain operations used by read and write sets
pub(crate) trait Versioned: Send + Sync {
    /// Commit-time validation: any commit newer than `source`
    fn has_commit_after(&self, source: Revision) -> bool;

    /// Abort: drop the node written by `target`
    fn discard(&self, target: &RevisionSlot) -> bool;

    /// Fold settled history once the write by `target` has settled
    fn consolidate(&self, target: &RevisionSlot, horizon: Revision) -> usize;
}

impl<M: Merge> Versioned for Chain<M> {
    fn has_commit_after(&self, source: Revision) -> bool {
        Chain::has_commit_after(self, source)
    }

    fn discard(&self, target: &RevisionSlot) -> bool {
        self.unlink(target)
    }

    fn consolidate(&self, target: &RevisionSlot, horizon: Revision) -> usize {
        Chain::consolidate(self, target, horizon)
    }
}

/// Identity of a type-erased chain
pub(crate) fn chain_id(chain: &Arc<dyn Versioned>) -> usize {
    Arc::as_ptr(chain) as *const () as usize
}
