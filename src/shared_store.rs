//! Value-deduplicated ("interned") component storage.

use crate::entity::EntityId;
use crate::error::Error;
use crate::sparse_set::SparseSet;
use alloc::vec::Vec;

/// Pairs a [`SparseSet`] with a `Vec<usize>` of shared-value indices and a
/// deduplicated `Vec<T>` of distinct values.
///
/// Every entity stores an index into `shared` rather than its own copy of
/// `T`; equal values are interned to the same slot. Writing is
/// `O(|shared|)` (a linear equality scan), which is the right trade only
/// when the number of *distinct* values is small — a large `shared` vector
/// defeats the point of this storage.
#[derive(Clone)]
pub struct SharedStore<T: PartialEq + Clone> {
    indices: SparseSet,
    data: Vec<usize>,
    shared: Vec<T>,
}

impl<T: PartialEq + Clone> Default for SharedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq + Clone> SharedStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        SharedStore {
            indices: SparseSet::new(),
            data: Vec::new(),
            shared: Vec::new(),
        }
    }

    /// Number of entities with a value.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` when no entity has a value.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
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

    /// Number of distinct values currently interned.
    #[inline]
    pub fn shared_len(&self) -> usize {
        self.shared.len()
    }

    /// Reference to `entity`'s value, if present.
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        let position = self.indices.position_of(entity).ok()?;
        Some(&self.shared[self.data[position]])
    }

    /// Sets `entity`'s value, interning it into `shared` if an equal value
    /// isn't already there.
    pub fn set(&mut self, entity: EntityId, value: T) {
        let shared_index = match self.shared.iter().position(|v| *v == value) {
            Some(index) => index,
            None => {
                self.shared.push(value);
                self.shared.len() - 1
            }
        };

        match self.indices.position_of(entity) {
            Ok(position) => self.data[position] = shared_index,
            Err(_) => {
                self.indices.insert(entity);
                self.data.push(shared_index);
            }
        }
    }

    /// Swap-removes `entity`, returning its value. Compacts `shared` if
    /// that was the value's last reference.
    pub fn remove(&mut self, entity: EntityId) -> Result<T, Error> {
        let position = self.indices.position_of(entity)?;
        let shared_index = self.data[position];

        let last = self.data.len() - 1;
        self.data.swap(position, last);
        self.data.pop();
        self.indices.remove(entity)?;

        if self.data.iter().any(|&i| i == shared_index) {
            // Still referenced by another entity: leave the slot alone and
            // hand back a clone of it.
            return Ok(self.shared[shared_index].clone());
        }

        let value = self.shared.swap_remove(shared_index);
        let moved_index = self.shared.len();
        if shared_index != moved_index {
            for slot in &mut self.data {
                if *slot == moved_index {
                    *slot = shared_index;
                }
            }
        }
        Ok(value)
    }

    /// Removes every entity and interned value.
    pub fn clear(&mut self) {
        self.indices.clear();
        self.data.clear();
        self.shared.clear();
    }

    /// Iterates entities in packed order.
    pub fn iter(&self) -> crate::sparse_set::Iter<'_> {
        self.indices.iter()
    }

    /// Iterates `(entity, &value)` pairs in packed order.
    pub fn iter_with_data(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.indices
            .iter()
            .zip(self.data.iter().map(|&i| &self.shared[i]))
    }

    /// Exchanges `e1` and `e2`'s packed positions, keeping `data` co-ordered
    /// with the index. `shared` itself is untouched since `data` only holds
    /// indices into it.
    pub fn swap_positions(&mut self, e1: EntityId, e2: EntityId) -> Result<(), Error> {
        let p1 = self.indices.position_of(e1)?;
        let p2 = self.indices.position_of(e2)?;
        self.indices.swap_positions(e1, e2)?;
        self.data.swap(p1, p2);
        Ok(())
    }

    /// Reorders `data` and the index together by `perm` (see
    /// [`SparseSet::permute`]); `shared` is untouched.
    pub fn permute(&mut self, perm: &[usize]) {
        debug_assert_eq!(perm.len(), self.data.len());
        self.data = perm.iter().map(|&i| self.data[i]).collect();
        self.indices.permute(perm);
    }
}

impl<T: PartialEq + Clone> PartialEq for SharedStore<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter_with_data().all(|(e, v)| other.get(e) == Some(v))
    }
}

impl<T: Eq + Clone> Eq for SharedStore<T> {}

impl<T: PartialEq + Clone + core::hash::Hash> core::hash::Hash for SharedStore<T> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        // Order-insensitive, like `SparseSet`: XOR each entity/value pair's
        // own hash together so insertion history can't change the result.
        use core::hash::{Hash, Hasher};
        self.len().hash(state);
        let mut combined = 0u64;
        for (e, v) in self.iter_with_data() {
            let mut h = DefaultHasher::default();
            e.hash(&mut h);
            v.hash(&mut h);
            combined ^= h.finish();
        }
        combined.hash(state);
    }
}

#[cfg(feature = "std")]
type DefaultHasher = std::collections::hash_map::DefaultHasher;
#[cfg(not(feature = "std"))]
use crate::sparse_set::hash::FnvHasher as DefaultHasher;
