//! The paged sparse-set index every storage in this crate is built on.
//!
//! A sparse set keeps two views of the same set of [`EntityId`]s: `packed`,
//! a dense vector in insertion order, and a paged `reverse` index mapping an
//! id back to its position in `packed`. Pages are allocated lazily and
//! reclaimed to a shared, immutable "null" sentinel as soon as every id in
//! them is removed, so memory stays proportional to the number of *live*
//! pages rather than the largest id ever inserted.

use crate::entity::EntityId;
use crate::error::Error;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Number of slots per page.
///
/// Mirrors the teacher crate's `BUCKET_SIZE = 256 / size_of::<EntityId>()`:
/// a page is sized so a handful of them fit in a cache line's worth of
/// pointer-sized slots.
pub const PAGE_LEN: usize = 256 / core::mem::size_of::<usize>();

/// One page of the sparse index: either the shared null sentinel or an
/// owned, zero-initialized buffer of packed-position-plus-one values.
///
/// A slot value of `0` means "absent"; a nonzero slot `k` means the id at
/// that slot lives at `packed[k - 1]`.
#[derive(Clone)]
pub enum Page {
    /// No id in this page's range is live. Never written to.
    Null,
    /// At least one id in this page's range is live.
    Live(Box<[usize; PAGE_LEN]>),
}

impl Page {
    fn slot(&self, offset: usize) -> usize {
        match self {
            Page::Null => 0,
            Page::Live(buf) => buf[offset],
        }
    }

    fn live_mut(&mut self) -> &mut [usize; PAGE_LEN] {
        if matches!(self, Page::Null) {
            *self = Page::Live(Box::new([0; PAGE_LEN]));
        }
        match self {
            Page::Live(buf) => buf,
            Page::Null => unreachable!("just allocated"),
        }
    }
}

/// Paged sparse-set index: O(1) membership, insertion, removal and
/// position lookup by [`EntityId`], with ids iterated in insertion order.
#[derive(Clone)]
pub struct SparseSet {
    packed: Vec<EntityId>,
    pages: Vec<Page>,
    counters: Vec<u32>,
}

impl Default for SparseSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseSet {
    /// Creates an empty sparse set.
    pub fn new() -> Self {
        SparseSet {
            packed: Vec::new(),
            pages: Vec::new(),
            counters: Vec::new(),
        }
    }

    /// Number of live ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.packed.len()
    }

    /// `true` when no id is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.packed.is_empty()
    }

    /// `true` iff `id` is live.
    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.pages
            .get(id.page())
            .is_some_and(|page| page.slot(id.page_offset()) != 0)
    }

    /// The id at packed position `position`, if any.
    ///
    /// Used by [`crate::join`] to walk a driving index by position without
    /// allocating a snapshot of it first.
    #[inline]
    pub fn nth(&self, position: usize) -> Option<EntityId> {
        self.packed.get(position).copied()
    }

    /// Packed position of `id`, or [`Error::NotPresent`] if it's absent.
    #[inline]
    pub fn position_of(&self, id: EntityId) -> Result<usize, Error> {
        let slot = self
            .pages
            .get(id.page())
            .map(|page| page.slot(id.page_offset()))
            .unwrap_or(0);
        if slot == 0 {
            Err(Error::NotPresent)
        } else {
            Ok(slot - 1)
        }
    }

    /// Inserts `id`. Idempotent: re-inserting a live id is a no-op.
    pub fn insert(&mut self, id: EntityId) {
        if self.contains(id) {
            return;
        }

        let page = id.page();
        if page >= self.pages.len() {
            self.pages.resize(page + 1, Page::Null);
            self.counters.resize(page + 1, 0);
        }

        let position = self.packed.len();
        self.packed.push(id);
        self.pages[page].live_mut()[id.page_offset()] = position + 1;
        self.counters[page] += 1;
    }

    /// Removes `id` via swap-remove, reclaiming its page if it becomes
    /// empty. Fails with [`Error::NotPresent`] if `id` wasn't live.
    pub fn remove(&mut self, id: EntityId) -> Result<(), Error> {
        let k = self.position_of(id)?;
        let n = self.packed.len();
        let tail = self.packed[n - 1];

        self.packed[k] = tail;
        self.packed.pop();
        if tail != id {
            self.write_slot(tail, k + 1);
        }

        let page = id.page();
        self.pages[page].live_mut()[id.page_offset()] = 0;
        self.counters[page] -= 1;
        if self.counters[page] == 0 {
            self.pages[page] = Page::Null;
            #[cfg(feature = "tracing")]
            tracing::trace!(page, "reclaimed sparse-set page to the null sentinel");
        }

        Ok(())
    }

    /// Like [`SparseSet::remove`] but panics if `id` isn't live.
    ///
    /// The panicking counterpart to `remove`'s fallible `Result`, for call
    /// sites that have already established `id` is present (see §7 of the
    /// design notes: both a fallible and a panicking removal are expected).
    pub fn delete(&mut self, id: EntityId) {
        self.remove(id)
            .unwrap_or_else(|err| panic!("{err}: {id:?}"));
    }

    /// Removes and returns the last id in packed order.
    /// Fails with [`Error::Empty`] if the set is empty.
    pub fn pop_last(&mut self) -> Result<EntityId, Error> {
        let id = *self.packed.last().ok_or(Error::Empty)?;
        self.remove(id)?;
        Ok(id)
    }

    /// Removes every id, dropping every page back to empty.
    pub fn clear(&mut self) {
        self.packed.clear();
        self.pages.clear();
        self.counters.clear();
    }

    /// Iterates live ids in packed (insertion) order.
    ///
    /// `Iter` borrows the set for its whole lifetime, so the borrow checker
    /// statically rules out the mutate-during-iteration hazard that other
    /// sparse-set implementations must guard against at runtime (see
    /// [`Error::IteratorInvalidated`]).
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            set: self,
            index: 0,
        }
    }

    /// Exchanges the packed positions of `a` and `b`.
    pub fn swap_positions(&mut self, a: EntityId, b: EntityId) -> Result<(), Error> {
        let pa = self.position_of(a)?;
        let pb = self.position_of(b)?;
        if pa != pb {
            self.packed.swap(pa, pb);
            self.write_slot(a, pb + 1);
            self.write_slot(b, pa + 1);
        }
        Ok(())
    }

    /// Reorders `packed` so that `packed[i]` becomes the id previously at
    /// `packed[perm[i]]`, repairing every reverse slot to match.
    ///
    /// `perm` must be a permutation of `0..self.len()`. Debug builds assert
    /// the length matches; this is the intended "apply perm, repair every
    /// reverse slot to position + 1" semantics (the upstream description of
    /// this operation has a transcription bug that this implementation does
    /// not follow).
    pub fn permute(&mut self, perm: &[usize]) {
        debug_assert_eq!(perm.len(), self.packed.len());

        let reordered: Vec<EntityId> = perm.iter().map(|&i| self.packed[i]).collect();
        self.packed = reordered;
        for (position, &id) in self.packed.iter().enumerate() {
            self.write_slot(id, position + 1);
        }
    }

    /// Union of `self` and `other`, in `self`'s order followed by the ids
    /// of `other` not already present.
    pub fn union(&self, other: &SparseSet) -> SparseSet {
        let mut result = self.clone();
        for id in other.iter() {
            result.insert(id);
        }
        result
    }

    /// Ids present in both `self` and `other`, in `self`'s order.
    pub fn intersection(&self, other: &SparseSet) -> SparseSet {
        let mut result = SparseSet::new();
        for id in self.iter() {
            if other.contains(id) {
                result.insert(id);
            }
        }
        result
    }

    /// Ids present in `self` but not in `other`, in `self`'s order.
    pub fn difference(&self, other: &SparseSet) -> SparseSet {
        let mut result = SparseSet::new();
        for id in self.iter() {
            if !other.contains(id) {
                result.insert(id);
            }
        }
        result
    }

    /// `true` iff every id in `self` is also in `other`.
    ///
    /// Implemented as `self == intersection(self, other)`, which holds iff
    /// `self` is a subset of `other`.
    pub fn is_subset(&self, other: &SparseSet) -> bool {
        *self == self.intersection(other)
    }

    fn write_slot(&mut self, id: EntityId, value: usize) {
        self.pages[id.page()].live_mut()[id.page_offset()] = value;
    }
}

/// Above this length, `eq` first compares the order-insensitive combined
/// hash of both sets and bails out on a mismatch before falling back to the
/// full membership scan.
const HASH_SHORTCUT_THRESHOLD: usize = 20;

impl PartialEq for SparseSet {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        if self.len() > HASH_SHORTCUT_THRESHOLD
            && combined_hash(self) != combined_hash(other)
        {
            return false;
        }
        self.iter().all(|id| other.contains(id))
    }
}

impl Eq for SparseSet {}

impl core::hash::Hash for SparseSet {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        // Order-insensitive: XOR every id's own hash together so insertion
        // history (a packed-position detail) can't change the result.
        self.len().hash(state);
        combined_hash(self).hash(state);
    }
}

fn combined_hash(set: &SparseSet) -> u64 {
    use core::hash::{Hash, Hasher};
    let mut combined = 0u64;
    for id in set.iter() {
        let mut h = DefaultHasher::default();
        id.hash(&mut h);
        combined ^= h.finish();
    }
    combined
}

#[cfg(feature = "std")]
type DefaultHasher = std::collections::hash_map::DefaultHasher;
#[cfg(not(feature = "std"))]
type DefaultHasher = hash::FnvHasher;

#[cfg(not(feature = "std"))]
pub(crate) mod hash {
    /// A minimal FNV-1a hasher for the `no_std` build, where
    /// `std::collections::hash_map::DefaultHasher` isn't available.
    ///
    /// Shared across every storage's order-insensitive `Hash` impl
    /// (`SparseSet`, `SharedStore`, `GroupedStore`), not just this module's.
    #[derive(Default)]
    pub(crate) struct FnvHasher(u64);

    impl core::hash::Hasher for FnvHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            const PRIME: u64 = 0x100_0000_01b3;
            let mut hash = if self.0 == 0 { 0xcbf2_9ce4_8422_2325 } else { self.0 };
            for &byte in bytes {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(PRIME);
            }
            self.0 = hash;
        }
    }
}

/// Iterator over the ids of a [`SparseSet`], in packed (insertion) order.
pub struct Iter<'a> {
    set: &'a SparseSet,
    index: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        let id = *self.set.packed.get(self.index)?;
        self.index += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.set.packed.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

impl<'a> IntoIterator for &'a SparseSet {
    type Item = EntityId;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> EntityId {
        EntityId::new(raw).unwrap()
    }

    fn ids(raws: &[u64]) -> Vec<EntityId> {
        raws.iter().map(|&r| id(r)).collect()
    }

    #[test]
    fn sparse_insert_and_swap_remove() {
        let mut set = SparseSet::new();
        for &raw in &[2, 4, 6, 8, 10] {
            set.insert(id(raw));
        }
        assert_eq!(set.iter().collect::<Vec<_>>(), ids(&[2, 4, 6, 8, 10]));
        for (pos, &raw) in [2u64, 4, 6, 8, 10].iter().enumerate() {
            assert_eq!(set.position_of(id(raw)).unwrap(), pos);
        }

        set.remove(id(4)).unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), ids(&[2, 10, 6, 8]));
        for (pos, &raw) in [2u64, 10, 6, 8].iter().enumerate() {
            assert_eq!(set.position_of(id(raw)).unwrap(), pos);
        }
        assert!(!set.contains(id(4)));
    }

    #[test]
    fn page_reclaimed_when_empty() {
        let page_len = PAGE_LEN as u64;
        let mut set = SparseSet::new();
        let overflow = id(page_len + 1);
        set.insert(overflow);
        assert!(matches!(set.pages[1], Page::Live(_)));
        assert_eq!(set.counters[1], 1);

        set.remove(overflow).unwrap();
        assert!(matches!(set.pages[1], Page::Null));
        assert_eq!(set.counters[1], 0);
    }

    #[test]
    fn insert_is_idempotent() {
        let mut set = SparseSet::new();
        set.insert(id(1));
        set.insert(id(1));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_absent_is_not_present() {
        let mut set = SparseSet::new();
        assert_eq!(set.remove(id(1)), Err(Error::NotPresent));
    }

    #[test]
    fn pop_last_on_empty_is_error() {
        let mut set = SparseSet::new();
        assert_eq!(set.pop_last(), Err(Error::Empty));
    }

    #[test]
    fn swap_remove_of_last_equals_pop() {
        let mut set = SparseSet::new();
        set.insert(id(1));
        set.insert(id(2));
        set.insert(id(3));

        let mut cloned = set.clone();
        set.remove(id(3)).unwrap();
        cloned.pop_last().unwrap();
        assert_eq!(set, cloned);
    }

    #[test]
    fn insert_remove_round_trip_restores_state() {
        let mut baseline = SparseSet::new();
        baseline.insert(id(1));
        baseline.insert(id(2));

        let mut probe = baseline.clone();
        probe.insert(id(3));
        probe.remove(id(3)).unwrap();

        assert_eq!(baseline, probe);
    }

    #[test]
    fn equality_past_the_hash_shortcut_threshold() {
        let mut a = SparseSet::new();
        let mut b = SparseSet::new();
        for raw in 1..=(HASH_SHORTCUT_THRESHOLD as u64 + 5) {
            a.insert(id(raw));
            b.insert(id(raw));
        }
        assert_eq!(a, b);

        b.remove(id(1)).unwrap();
        assert_ne!(a, b);
        b.insert(id(1));
        assert_eq!(a, b);
    }

    #[test]
    fn set_algebra() {
        let mut a = SparseSet::new();
        let mut b = SparseSet::new();
        for raw in [1, 2, 3] {
            a.insert(id(raw));
        }
        for raw in [2, 3, 4] {
            b.insert(id(raw));
        }

        assert_eq!(
            a.union(&b).iter().collect::<Vec<_>>(),
            ids(&[1, 2, 3, 4])
        );
        assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), ids(&[2, 3]));
        assert_eq!(a.difference(&b).iter().collect::<Vec<_>>(), ids(&[1]));

        let mut subset = SparseSet::new();
        subset.insert(id(2));
        assert!(subset.is_subset(&a));
        assert!(!a.is_subset(&subset));
    }

    #[test]
    fn permute_reorders_and_repairs_reverse_slots() {
        let mut set = SparseSet::new();
        for raw in [10, 20, 30] {
            set.insert(id(raw));
        }
        // new order: [30, 10, 20]
        set.permute(&[2, 0, 1]);
        assert_eq!(set.iter().collect::<Vec<_>>(), ids(&[30, 10, 20]));
        assert_eq!(set.position_of(id(30)).unwrap(), 0);
        assert_eq!(set.position_of(id(10)).unwrap(), 1);
        assert_eq!(set.position_of(id(20)).unwrap(), 2);
    }

    #[test]
    fn iter_is_exact_size_and_reusable() {
        let mut set = SparseSet::new();
        for raw in [1, 2, 3] {
            set.insert(id(raw));
        }
        let mut iter = set.iter();
        assert_eq!(iter.len(), 3);
        iter.next();
        assert_eq!(iter.len(), 2);

        // `iter()` can be called again once the previous borrow ends; the
        // borrow checker (not a runtime flag) is what rules out mutating
        // `set` while an iterator over it is still alive.
        assert_eq!(set.iter().collect::<Vec<_>>(), ids(&[1, 2, 3]));
    }
}
