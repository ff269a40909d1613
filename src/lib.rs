//! Paged sparse-set entity-component storage core.
//!
//! `sparsework` is the engine underneath an entity-component system, not the
//! system itself: it owns no world, no component registry and no iteration
//! macros. It gives you a paged sparse-set index ([`SparseSet`]) and three
//! storage shapes built on top of it ([`DenseStore`], [`SharedStore`],
//! [`GroupedStore`]), plus a lazy join iterator ([`join()`](crate::join::join)) for walking
//! entities that satisfy a boolean predicate over component membership.
//!
//! Everything here is synchronous and single-owner (see [`SparseSet`] for the
//! paging/swap-remove invariants); a surrounding world type is expected to
//! provide whichever synchronization or multi-threading story it needs.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod dense_store;
pub mod entity;
pub mod error;
pub mod grouped_store;
pub mod join;
pub mod shared_store;
pub mod sparse_set;

pub use dense_store::DenseStore;
pub use entity::EntityId;
pub use error::Error;
pub use grouped_store::GroupedStore;
pub use join::{all_of, any_of, component, join, not, Indexed, JoinIter, Predicate};
pub use shared_store::SharedStore;
pub use sparse_set::{Page, SparseSet, PAGE_LEN};
