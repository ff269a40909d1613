//! Parent-linked, equivalence-class component storage.
//!
//! Entities that share a value are folded into one "group"; writing through
//! any member of a group updates the value for all of them.

use crate::entity::EntityId;
use crate::error::Error;
use crate::sparse_set::SparseSet;
use alloc::vec::Vec;

/// Pairs a [`SparseSet`] with a per-entity group id, a per-group size, and
/// one value per group.
///
/// `group[p]` is the group id of the entity at packed position `p`;
/// `group_size[g]` is how many entities share group `g`;
/// `data[g]` is the value group `g` shares.
#[derive(Clone)]
pub struct GroupedStore<T: PartialEq + Clone> {
    indices: SparseSet,
    group: Vec<usize>,
    group_size: Vec<usize>,
    data: Vec<T>,
}

impl<T: PartialEq + Clone> Default for GroupedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq + Clone> GroupedStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        GroupedStore {
            indices: SparseSet::new(),
            group: Vec::new(),
            group_size: Vec::new(),
            data: Vec::new(),
        }
    }

    /// Number of entities with a value.
    #[inline]
    pub fn len(&self) -> usize {
        self.group.len()
    }

    /// `true` when no entity has a value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.group.is_empty()
    }

    /// `true` iff `entity` has a value.
    #[inline]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.indices.contains(entity)
    }

    /// The sparse-set index backing this store, for use as a [`join`]
    /// driver or operand.
    ///
    /// [`join`]: crate::join
    #[inline]
    pub fn indices(&self) -> &SparseSet {
        &self.indices
    }

    /// Number of live groups (including singletons).
    #[inline]
    pub fn group_count(&self) -> usize {
        self.data.len()
    }

    /// The group id `entity` currently belongs to.
    pub fn group_of(&self, entity: EntityId) -> Result<usize, Error> {
        let p = self.indices.position_of(entity)?;
        Ok(self.group[p])
    }

    /// How many entities belong to group `g`.
    pub fn group_size(&self, g: usize) -> usize {
        self.group_size.get(g).copied().unwrap_or(0)
    }

    /// Reference to `entity`'s (group-shared) value, if present.
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        let p = self.indices.position_of(entity).ok()?;
        Some(&self.data[self.group[p]])
    }

    /// Sets `entity`'s value.
    ///
    /// - If `entity` is absent, it becomes a fresh singleton group.
    /// - If present alone in its group, the group's value is overwritten
    ///   in place.
    /// - If present in a larger group, `entity` detaches into a new
    ///   singleton group with `value`, leaving the rest of the old group
    ///   untouched.
    pub fn set(&mut self, entity: EntityId, value: T) {
        match self.indices.position_of(entity) {
            Err(_) => {
                self.indices.insert(entity);
                self.group.push(self.data.len());
                self.group_size.push(1);
                self.data.push(value);
            }
            Ok(p) => {
                let g = self.group[p];
                if self.group_size[g] == 1 {
                    self.data[g] = value;
                } else {
                    self.group_size[g] -= 1;
                    let new_group = self.data.len();
                    self.group_size.push(1);
                    self.data.push(value);
                    self.group[p] = new_group;
                }
            }
        }
    }

    /// Joins `entity` into `parent`'s group, sharing `parent`'s value.
    ///
    /// If `entity` was the sole member of its previous group, that group
    /// is deleted and every higher group id shifts down by one to fill the
    /// gap. Fails with [`Error::ParentMissing`] if `parent` isn't present.
    pub fn set_with_parent(&mut self, entity: EntityId, parent: EntityId) -> Result<(), Error> {
        let parent_pos = self
            .indices
            .position_of(parent)
            .map_err(|_| Error::ParentMissing)?;
        let mut parent_group = self.group[parent_pos];

        match self.indices.position_of(entity) {
            Err(_) => {
                self.indices.insert(entity);
                self.group.push(parent_group);
                self.group_size[parent_group] += 1;
            }
            Ok(p) => {
                let old_group = self.group[p];
                if self.group_size[old_group] == 1 {
                    self.data.remove(old_group);
                    self.group_size.remove(old_group);
                    for slot in &mut self.group {
                        if *slot > old_group {
                            *slot -= 1;
                        }
                    }
                    if parent_group > old_group {
                        parent_group -= 1;
                    }
                } else {
                    self.group_size[old_group] -= 1;
                }
                self.group[p] = parent_group;
                self.group_size[parent_group] += 1;
            }
        }
        Ok(())
    }

    /// Overwrites the value shared by `entity`'s whole group.
    pub fn set_group(&mut self, entity: EntityId, value: T) -> Result<(), Error> {
        let p = self.indices.position_of(entity)?;
        self.data[self.group[p]] = value;
        Ok(())
    }

    /// Swap-removes `entity`, returning the value its group held.
    ///
    /// If `entity` was the group's last member, the group itself is
    /// deleted and every higher group id shifts down by one.
    pub fn remove(&mut self, entity: EntityId) -> Result<T, Error> {
        let p = self.indices.position_of(entity)?;
        let g = self.group[p];

        let last = self.group.len() - 1;
        self.group[p] = self.group[last];
        self.group.pop();
        self.indices.remove(entity)?;

        self.group_size[g] -= 1;
        let value = self.data[g].clone();

        if self.group_size[g] == 0 {
            self.data.remove(g);
            self.group_size.remove(g);
            for slot in &mut self.group {
                if *slot > g {
                    *slot -= 1;
                }
            }
        }

        Ok(value)
    }

    /// Removes every entity and group.
    pub fn clear(&mut self) {
        self.indices.clear();
        self.group.clear();
        self.group_size.clear();
        self.data.clear();
    }

    /// Iterates entities in packed order.
    pub fn iter(&self) -> crate::sparse_set::Iter<'_> {
        self.indices.iter()
    }

    /// Iterates every entity currently in group `g`.
    pub fn iter_group(&self, g: usize) -> impl Iterator<Item = EntityId> + '_ {
        self.indices
            .iter()
            .zip(self.group.iter())
            .filter_map(move |(entity, &eg)| (eg == g).then_some(entity))
    }

    /// Folds groups whose values compare equal into one, then compacts
    /// away every now-empty group id.
    ///
    /// Idempotent: running it again after it has already run is a no-op,
    /// and `get(e)` returns the same value for every entity before and
    /// after.
    pub fn make_unique(&mut self) {
        let group_count = self.data.len();

        // Pass 1: fold later groups with an equal value into the earliest
        // group that holds it.
        for earliest in 0..group_count {
            if self.group_size[earliest] == 0 {
                continue;
            }
            for later in (earliest + 1)..group_count {
                if self.group_size[later] == 0 || self.data[later] != self.data[earliest] {
                    continue;
                }
                self.group_size[earliest] += self.group_size[later];
                self.group_size[later] = 0;
                for slot in &mut self.group {
                    if *slot == later {
                        *slot = earliest;
                    }
                }
            }
        }

        // Pass 2: compact out every group with size 0.
        let old_sizes = self.group_size.clone();
        let mut new_index = Vec::with_capacity(group_count);
        let mut new_data = Vec::with_capacity(group_count);
        let mut new_sizes = Vec::with_capacity(group_count);
        for (old_group, value) in self.data.drain(..).enumerate() {
            if old_sizes[old_group] > 0 {
                new_index.push(new_data.len());
                new_data.push(value);
                new_sizes.push(old_sizes[old_group]);
            } else {
                new_index.push(usize::MAX);
            }
        }
        self.data = new_data;
        self.group_size = new_sizes;
        for slot in &mut self.group {
            *slot = new_index[*slot];
        }
    }
}

impl<T: PartialEq + Clone> PartialEq for GroupedStore<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|e| self.get(e) == other.get(e))
    }
}

impl<T: Eq + Clone> Eq for GroupedStore<T> {}

impl<T: PartialEq + Clone + core::hash::Hash> core::hash::Hash for GroupedStore<T> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        // Order-insensitive, like `SparseSet`/`SharedStore`: XOR each
        // entity/value pair's own hash together so insertion history and
        // group-id numbering (both implementation details) can't change
        // the result.
        use core::hash::{Hash, Hasher};
        self.len().hash(state);
        let mut combined = 0u64;
        for e in self.iter() {
            let mut h = DefaultHasher::default();
            e.hash(&mut h);
            self.get(e).hash(&mut h);
            combined ^= h.finish();
        }
        combined.hash(state);
    }
}

#[cfg(feature = "std")]
type DefaultHasher = std::collections::hash_map::DefaultHasher;
#[cfg(not(feature = "std"))]
use crate::sparse_set::hash::FnvHasher as DefaultHasher;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Test {
        x: i64,
    }

    fn id(raw: u64) -> EntityId {
        EntityId::new(raw).unwrap()
    }

    #[test]
    fn set_then_get() {
        let mut store = GroupedStore::new();
        store.set(id(1), Test { x: 1 });
        assert_eq!(store.get(id(1)), Some(&Test { x: 1 }));
    }

    #[test]
    fn parent_link_grows_the_shared_group() {
        let mut store = GroupedStore::new();
        let p1 = id(1);
        store.set(p1, Test { x: 1 });

        let f = id(2);
        store.set_with_parent(f, p1).unwrap();

        assert_eq!(store.get(f), store.get(p1));
        assert_eq!(store.group_size(store.group_of(p1).unwrap()), 2);
    }

    #[test]
    fn set_with_parent_requires_a_present_parent() {
        let mut store: GroupedStore<Test> = GroupedStore::new();
        assert_eq!(
            store.set_with_parent(id(1), id(2)),
            Err(Error::ParentMissing)
        );
    }

    #[test]
    fn grouped_linking_scenario() {
        // Mirrors the ten-entity linking scenario from the design notes:
        // two parents, eight children split between them by parity.
        let mut store = GroupedStore::new();
        let p1 = id(1);
        let p2 = id(2);
        store.set(p1, Test { x: 1 });
        store.set(p2, Test { x: 2 });

        for i in 3..=10u64 {
            let parent = if i % 2 == 1 { p1 } else { p2 };
            store.set_with_parent(id(i), parent).unwrap();
        }

        let g1 = store.group_of(p1).unwrap();
        let g2 = store.group_of(p2).unwrap();
        assert_eq!(store.group_size(g1), 5);
        assert_eq!(store.group_size(g2), 5);
        assert_eq!(store.group_count(), 2);

        let sum: i64 = (1..=10u64).map(|i| store.get(id(i)).unwrap().x).sum();
        assert_eq!(sum, 15);
    }

    #[test]
    fn detach_on_overwrite_of_a_linked_entity() {
        let mut store = GroupedStore::new();
        let p1 = id(1);
        let p2 = id(2);
        store.set(p1, Test { x: 1 });
        store.set(p2, Test { x: 2 });
        store.set_with_parent(id(3), p2).unwrap();

        let g2_before = store.group_of(p2).unwrap();
        assert_eq!(store.group_size(g2_before), 2);

        // Overwriting p2's own value while it shares a group detaches it
        // into a fresh singleton, leaving entity 3 in the old group.
        store.set(p2, Test { x: 20 });
        assert_eq!(store.group_size(g2_before), 1);
        assert_eq!(store.get(id(3)), Some(&Test { x: 2 }));
        assert_eq!(store.get(p2), Some(&Test { x: 20 }));
    }

    #[test]
    fn remove_shrinks_and_eventually_deletes_the_group() {
        let mut store = GroupedStore::new();
        let p1 = id(1);
        store.set(p1, Test { x: 1 });
        store.set_with_parent(id(2), p1).unwrap();

        let g = store.group_of(p1).unwrap();
        assert_eq!(store.remove(id(2)).unwrap(), Test { x: 1 });
        assert_eq!(store.group_size(g), 1);

        assert_eq!(store.remove(p1).unwrap(), Test { x: 1 });
        assert_eq!(store.group_count(), 0);
    }

    #[test]
    fn make_unique_merges_equal_groups_and_is_idempotent() {
        let mut store = GroupedStore::new();
        store.set(id(1), Test { x: 1 });
        store.set(id(2), Test { x: 1 });
        store.set(id(3), Test { x: 2 });

        assert_eq!(store.group_count(), 3);
        store.make_unique();
        assert_eq!(store.group_count(), 2);
        assert_eq!(store.get(id(1)), Some(&Test { x: 1 }));
        assert_eq!(store.get(id(2)), Some(&Test { x: 1 }));
        assert_eq!(store.get(id(3)), Some(&Test { x: 2 }));

        let before = (store.get(id(1)).copied(), store.get(id(2)).copied(), store.get(id(3)).copied());
        store.make_unique();
        assert_eq!(store.group_count(), 2);
        assert_eq!(
            before,
            (store.get(id(1)).copied(), store.get(id(2)).copied(), store.get(id(3)).copied())
        );
    }

    #[test]
    fn equal_stores_compare_equal_regardless_of_group_numbering() {
        let mut a = GroupedStore::new();
        a.set(id(1), Test { x: 1 });
        a.set_with_parent(id(2), id(1)).unwrap();
        a.set(id(3), Test { x: 2 });

        let mut b = GroupedStore::new();
        b.set(id(3), Test { x: 2 });
        b.set(id(1), Test { x: 1 });
        b.set_with_parent(id(2), id(1)).unwrap();

        assert_eq!(a, b);
    }
}
