//! Lazy, single-pass join iteration over a boolean predicate of component
//! membership.
//!
//! ```
//! use sparsework::entity::EntityId;
//! use sparsework::join::{all_of, any_of, component, join, not};
//! use sparsework::sparse_set::SparseSet;
//!
//! let mut a = SparseSet::new();
//! let mut b = SparseSet::new();
//! let mut c = SparseSet::new();
//! for raw in [1, 2, 3, 4] {
//!     a.insert(EntityId::new(raw).unwrap());
//! }
//! for raw in [2, 3] {
//!     b.insert(EntityId::new(raw).unwrap());
//! }
//! for raw in [3, 4] {
//!     c.insert(EntityId::new(raw).unwrap());
//! }
//!
//! // A ∧ (B ∨ C) ∧ ¬(B ∧ C)
//! let entities: Vec<_> = join(all_of([
//!     component(&a),
//!     any_of([component(&b), component(&c)]),
//!     not(all_of([component(&b), component(&c)])),
//! ]))
//! .collect();
//! assert_eq!(
//!     entities,
//!     vec![EntityId::new(2).unwrap(), EntityId::new(4).unwrap()]
//! );
//! ```

use crate::entity::EntityId;
use crate::sparse_set::SparseSet;
use alloc::boxed::Box;
use alloc::vec::Vec;

/// The capability [`join`] needs from a component storage: an O(1)
/// membership test and the [`SparseSet`] backing it.
///
/// Any of [`DenseStore`](crate::DenseStore), [`SharedStore`](crate::SharedStore),
/// [`GroupedStore`](crate::GroupedStore) or a bare [`SparseSet`] implement
/// this; callers building their own storage kind need only implement these
/// two methods to make it joinable.
pub trait Indexed {
    /// The sparse-set index backing this storage.
    fn indices(&self) -> &SparseSet;
    /// `true` iff `entity` has a value in this storage.
    fn contains(&self, entity: EntityId) -> bool;
}

impl Indexed for SparseSet {
    #[inline]
    fn indices(&self) -> &SparseSet {
        self
    }

    #[inline]
    fn contains(&self, entity: EntityId) -> bool {
        SparseSet::contains(self, entity)
    }
}

impl<T> Indexed for crate::DenseStore<T> {
    #[inline]
    fn indices(&self) -> &SparseSet {
        self.indices()
    }

    #[inline]
    fn contains(&self, entity: EntityId) -> bool {
        self.contains(entity)
    }
}

impl<T: PartialEq + Clone> Indexed for crate::SharedStore<T> {
    #[inline]
    fn indices(&self) -> &SparseSet {
        self.indices()
    }

    #[inline]
    fn contains(&self, entity: EntityId) -> bool {
        self.contains(entity)
    }
}

impl<T: PartialEq + Clone> Indexed for crate::GroupedStore<T> {
    #[inline]
    fn indices(&self) -> &SparseSet {
        self.indices()
    }

    #[inline]
    fn contains(&self, entity: EntityId) -> bool {
        self.contains(entity)
    }
}

/// A boolean expression over component presence.
///
/// Built with [`component`], [`all_of`], [`any_of`] and [`not`]; evaluated
/// with O(1) `contains` calls per leaf. [`join`] additionally inspects the
/// *top level* of the tree to choose a driving index (see its docs) —
/// conjuncts and disjuncts nested under a [`not`] never drive, matching the
/// "negations are evaluated but don't drive selection" rule.
pub enum Predicate<'a> {
    /// A single component must be present.
    Has(&'a dyn Indexed),
    /// The wrapped predicate must not hold.
    Not(Box<Predicate<'a>>),
    /// Every child predicate must hold.
    And(Vec<Predicate<'a>>),
    /// At least one child predicate must hold.
    Or(Vec<Predicate<'a>>),
}

/// A leaf predicate: `entity` must have a value in `store`.
pub fn component(store: &dyn Indexed) -> Predicate<'_> {
    Predicate::Has(store)
}

/// A predicate requiring every one of `predicates` to hold (logical AND).
pub fn all_of<'a>(predicates: impl IntoIterator<Item = Predicate<'a>>) -> Predicate<'a> {
    Predicate::And(predicates.into_iter().collect())
}

/// A predicate requiring at least one of `predicates` to hold (logical OR).
pub fn any_of<'a>(predicates: impl IntoIterator<Item = Predicate<'a>>) -> Predicate<'a> {
    Predicate::Or(predicates.into_iter().collect())
}

/// Negates `predicate`.
pub fn not(predicate: Predicate<'_>) -> Predicate<'_> {
    Predicate::Not(Box::new(predicate))
}

impl<'a> Predicate<'a> {
    /// Evaluates the predicate for `entity` using O(1) membership checks.
    pub fn eval(&self, entity: EntityId) -> bool {
        match self {
            Predicate::Has(store) => store.contains(entity),
            Predicate::Not(inner) => !inner.eval(entity),
            Predicate::And(children) => children.iter().all(|child| child.eval(entity)),
            Predicate::Or(children) => children.iter().any(|child| child.eval(entity)),
        }
    }

    /// Collects the top-level positive conjuncts and disjuncts that may
    /// drive iteration (§4.5 steps 1-2): direct `Has` leaves and direct
    /// children of `And` contribute to `conjuncts`; every `Has` leaf
    /// reachable under a directly-nested `Or` (however deeply it is itself
    /// nested with further `And`/`Or`) contributes to `disjuncts` via
    /// [`Predicate::collect_leaves`]. Anything under a `Not` is ignored here
    /// (it's still evaluated by `eval`, just never drives).
    fn collect_drivers(&self, conjuncts: &mut Vec<&'a dyn Indexed>, disjuncts: &mut Vec<&'a dyn Indexed>) {
        match self {
            Predicate::Has(store) => conjuncts.push(*store),
            Predicate::Not(_) => {}
            Predicate::And(children) => {
                for child in children {
                    match child {
                        Predicate::Has(store) => conjuncts.push(*store),
                        Predicate::And(_) => child.collect_drivers(conjuncts, disjuncts),
                        Predicate::Or(grandchildren) => {
                            for g in grandchildren {
                                g.collect_leaves(disjuncts);
                            }
                        }
                        Predicate::Not(_) => {}
                    }
                }
            }
            Predicate::Or(children) => {
                for child in children {
                    child.collect_leaves(disjuncts);
                }
            }
        }
    }

    /// Collects every `Has` leaf reachable under `self`, skipping anything
    /// nested under a `Not` (a negated leaf never needs to be present, so it
    /// must not be added to a driver union).
    ///
    /// Used to build a safe driver union for a disjunct that is itself a
    /// compound predicate (e.g. `any_of([all_of([component(a), component(c)]),
    /// ...])`): whatever entities satisfy an `And`/`Or` subtree are always a
    /// subset of the union of its own non-negated leaves, so unioning over
    /// every leaf here is a superset of the true matches, not just the
    /// `Has` leaves directly under the top-level `Or` — dropping a
    /// compound disjunct's leaves entirely would silently lose entities
    /// that only that branch of the predicate matches.
    fn collect_leaves(&self, out: &mut Vec<&'a dyn Indexed>) {
        match self {
            Predicate::Has(store) => out.push(*store),
            Predicate::Not(_) => {}
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }
}

enum Driver<'a> {
    /// Driving directly off the shortest positive conjunct's own index.
    Borrowed(&'a SparseSet),
    /// No positive conjunct existed; driving off a freshly built union of
    /// the disjuncts' indices (the one allocation join's guarantees allow).
    Owned(SparseSet),
}

impl<'a> Driver<'a> {
    fn as_set(&self) -> &SparseSet {
        match self {
            Driver::Borrowed(set) => set,
            Driver::Owned(set) => set,
        }
    }
}

/// Lazy iterator over the entities satisfying a [`Predicate`].
///
/// Single-pass, stable order (the driver's packed order), O(`|driver|`)
/// with O(1) membership checks per step, and no allocation beyond the
/// driver-union step when the predicate has no positive conjunct.
pub struct JoinIter<'a> {
    driver: Driver<'a>,
    position: usize,
    predicate: Predicate<'a>,
}

impl<'a> Iterator for JoinIter<'a> {
    type Item = EntityId;

    fn next(&mut self) -> Option<EntityId> {
        loop {
            let candidate = self.driver.as_set().nth(self.position)?;
            self.position += 1;
            if self.predicate.eval(candidate) {
                return Some(candidate);
            }
        }
    }
}

/// Builds a [`JoinIter`] over `predicate`.
///
/// Driver choice (§4.5): if the predicate has any top-level positive
/// conjunct, drive from the shortest one's index; otherwise drive from the
/// union of its top-level disjuncts. A predicate with neither (for example
/// a bare `not(...)`) has nothing to drive from and yields no entities.
pub fn join(predicate: Predicate<'_>) -> JoinIter<'_> {
    let mut conjuncts = Vec::new();
    let mut disjuncts = Vec::new();
    predicate.collect_drivers(&mut conjuncts, &mut disjuncts);

    let driver = match conjuncts
        .iter()
        .min_by_key(|store| store.indices().len())
    {
        Some(shortest) => Driver::Borrowed(shortest.indices()),
        None => {
            let mut union = SparseSet::new();
            for store in &disjuncts {
                for entity in store.indices().iter() {
                    union.insert(entity);
                }
            }
            Driver::Owned(union)
        }
    };

    JoinIter {
        driver,
        position: 0,
        predicate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DenseStore;

    fn id(raw: u64) -> EntityId {
        EntityId::new(raw).unwrap()
    }

    fn set(raws: &[u64]) -> SparseSet {
        let mut s = SparseSet::new();
        for &raw in raws {
            s.insert(id(raw));
        }
        s
    }

    #[test]
    fn drives_from_shortest_conjunct() {
        let a = set(&[1, 2, 3, 4, 5]);
        let b = set(&[2, 4]);

        let result: Vec<_> = join(all_of([component(&a), component(&b)])).collect();
        assert_eq!(result, vec![id(2), id(4)]);
    }

    #[test]
    fn drives_from_disjunct_union_without_a_conjunct() {
        let b = set(&[2, 4]);
        let c = set(&[3, 4]);

        let result: Vec<_> = join(any_of([component(&b), component(&c)])).collect();
        assert_eq!(result, vec![id(2), id(4), id(3)]);
    }

    #[test]
    fn negation_filters_without_driving() {
        let a = set(&[1, 2, 3]);
        let b = set(&[2]);

        let result: Vec<_> = join(all_of([component(&a), not(component(&b))])).collect();
        assert_eq!(result, vec![id(1), id(3)]);
    }

    #[test]
    fn scenario_a_and_b_or_c_and_not_both() {
        let a = set(&[1, 2, 3, 4]);
        let b = set(&[2, 3]);
        let c = set(&[3, 4]);

        let predicate = all_of([
            component(&a),
            any_of([component(&b), component(&c)]),
            not(all_of([component(&b), component(&c)])),
        ]);
        let result: Vec<_> = join(predicate).collect();
        assert_eq!(result, vec![id(2), id(4)]);
    }

    #[test]
    fn drives_from_compound_disjuncts() {
        // (A ∧ C) ∨ (D ∧ ¬B): no top-level positive conjunct, and both
        // disjuncts are themselves compound, so the driver must be built
        // from every leaf reachable under the `Or`, not just `Has` leaves
        // directly under it.
        let a = set(&[1, 2, 3]);
        let b = set(&[1]);
        let c = set(&[2, 3]);
        let d = set(&[4]);

        let predicate = any_of([
            all_of([component(&a), component(&c)]),
            all_of([component(&d), not(component(&b))]),
        ]);
        let mut result: Vec<_> = join(predicate).collect();
        result.sort();
        assert_eq!(result, vec![id(2), id(3), id(4)]);
    }

    #[test]
    fn joins_over_real_stores() {
        let mut positions: DenseStore<(i32, i32)> = DenseStore::new();
        let mut velocities: DenseStore<(i32, i32)> = DenseStore::new();
        positions.set(id(1), (0, 0));
        positions.set(id(2), (1, 1));
        velocities.set(id(2), (1, 0));

        let moving: Vec<_> =
            join(all_of([component(&positions), component(&velocities)])).collect();
        assert_eq!(moving, vec![id(2)]);
    }
}
