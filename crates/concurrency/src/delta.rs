//! Container semantics for collection cells
//!
//! A collection revision stores what it `added` and what it `removed`
//! relative to older revisions. Replaying a revision applies the additions
//! first, then the removals. A replacing delta (the genesis revision, or one
//! folded by garbage collection) first clears whatever was replayed before
//! it, so replaying history it already covers is harmless.
//!
//! Two containers are provided:
//! - `FxHashSet<T>`: unordered set. Staging keeps `added` and `removed`
//!   disjoint, so an item added then removed in one revision nets to absent
//!   and an item removed then added nets to present.
//! - `Vec<T>`: insertion-ordered sequence with duplicates. `add` appends,
//!   `remove` deletes the earliest occurrence.
//!
//! Removals are only staged for items that are present in the writer's view,
//! which makes the deferred replay agree with applying each operation in turn.

use rustc_hash::FxHashSet;
use std::hash::Hash;

/// A container a collection cell can hold
pub trait Collection: Default + Clone + Send + Sync + 'static {
    /// Element type
    type Item: Clone + Send + Sync + 'static;

    /// Add one item
    fn insert_item(&mut self, item: Self::Item);

    /// Remove one occurrence of `item`, returning whether it was present
    fn remove_item(&mut self, item: &Self::Item) -> bool;

    /// Whether `item` is present
    fn contains_item(&self, item: &Self::Item) -> bool;

    /// Number of items
    fn item_count(&self) -> usize;

    /// Add every item of `other`
    fn absorb(&mut self, other: &Self);

    /// Remove every item of `other`, one occurrence per entry
    fn subtract(&mut self, other: &Self);

    /// Stage an addition into a revision's pending changes
    fn stage_add(added: &mut Self, removed: &mut Self, item: Self::Item);

    /// Stage a removal into a revision's pending changes
    fn stage_remove(added: &mut Self, removed: &mut Self, item: Self::Item);
}

impl<T> Collection for FxHashSet<T>
where
    T: Eq + Hash + Clone + Send + Sync + 'static,
{
    type Item = T;

    fn insert_item(&mut self, item: T) {
        self.insert(item);
    }

    fn remove_item(&mut self, item: &T) -> bool {
        self.remove(item)
    }

    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn item_count(&self) -> usize {
        self.len()
    }

    fn absorb(&mut self, other: &Self) {
        self.extend(other.iter().cloned());
    }

    fn subtract(&mut self, other: &Self) {
        for item in other {
            self.remove(item);
        }
    }

    fn stage_add(added: &mut Self, removed: &mut Self, item: T) {
        removed.remove(&item);
        added.insert(item);
    }

    fn stage_remove(added: &mut Self, removed: &mut Self, item: T) {
        added.remove(&item);
        removed.insert(item);
    }
}

impl<T> Collection for Vec<T>
where
    T: PartialEq + Clone + Send + Sync + 'static,
{
    type Item = T;

    fn insert_item(&mut self, item: T) {
        self.push(item);
    }

    fn remove_item(&mut self, item: &T) -> bool {
        match self.iter().position(|existing| existing == item) {
            Some(index) => {
                self.remove(index);
                true
            }
            None => false,
        }
    }

    fn contains_item(&self, item: &T) -> bool {
        self.contains(item)
    }

    fn item_count(&self) -> usize {
        self.len()
    }

    fn absorb(&mut self, other: &Self) {
        self.extend_from_slice(other);
    }

    fn subtract(&mut self, other: &Self) {
        for item in other {
            self.remove_item(item);
        }
    }

    fn stage_add(added: &mut Self, _removed: &mut Self, item: T) {
        added.push(item);
    }

    fn stage_remove(_added: &mut Self, removed: &mut Self, item: T) {
        removed.push(item);
    }
}

/// Changes made by one revision of a collection cell
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta<C> {
    /// Items added by the revision
    pub added: C,
    /// Items removed by the revision
    pub removed: C,
    /// The revision rebuilds the whole collection, discarding older history
    pub replaces: bool,
}

impl<C: Collection> Delta<C> {
    /// A delta that rebuilds `items` from an empty container
    pub fn absolute(items: C) -> Self {
        Delta {
            added: items,
            removed: C::default(),
            replaces: true,
        }
    }

    /// Stage an addition
    pub fn add(&mut self, item: C::Item) {
        C::stage_add(&mut self.added, &mut self.removed, item);
    }

    /// Stage a removal
    pub fn remove(&mut self, item: C::Item) {
        C::stage_remove(&mut self.added, &mut self.removed, item);
    }

    /// Apply this delta on top of `base`
    pub fn replay(&self, base: &mut C) {
        if self.replaces {
            *base = C::default();
        }
        base.absorb(&self.added);
        base.subtract(&self.removed);
    }

    /// `true` if the delta changes nothing
    pub fn is_empty(&self) -> bool {
        !self.replaces && self.added.item_count() == 0 && self.removed.item_count() == 0
    }
}

/// Rebuild a collection from deltas given in ascending revision order
pub fn replay_oldest_first<'a, C, I>(deltas: I) -> C
where
    C: Collection,
    I: IntoIterator<Item = &'a Delta<C>>,
{
    let mut value = C::default();
    for delta in deltas {
        delta.replay(&mut value);
    }
    value
}
