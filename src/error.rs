//! All error types.
//!
//! Every fallible operation in this crate validates before it mutates: an
//! operation that returns `Err` never leaves a storage partially modified.

use core::fmt::{self, Debug, Display, Formatter};
#[cfg(feature = "std")]
use std::error::Error as StdError;

/// The five boundary error kinds a caller of this crate can hit.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An id of `0` (or otherwise not positive) was passed to an operation
    /// that requires a valid [`EntityId`](crate::EntityId).
    InvalidId,
    /// The id is not present in the storage the operation targeted.
    NotPresent,
    /// `pop_last` (or an equivalent "take the last element" operation) was
    /// called on an empty storage.
    Empty,
    /// [`GroupedStore::set_with_parent`](crate::GroupedStore::set_with_parent)
    /// was given a parent entity that isn't present in the store.
    ParentMissing,
    /// A storage was mutated while one of its iterators was still live.
    ///
    /// Every iterator this crate hands out borrows the storage it walks, so
    /// the borrow checker rejects the mutate-during-iteration hazard at
    /// compile time and this variant is never actually constructed. It's
    /// kept in the enum for API completeness against the upstream design,
    /// and for callers who build their own unsafe, non-borrowing cursors on
    /// top of [`SparseSet`](crate::SparseSet) and want a matching error to
    /// report.
    IteratorInvalidated,
}

#[cfg(feature = "std")]
impl StdError for Error {}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId => f.write_str("ids must be positive, 0 is not a valid EntityId"),
            Self::NotPresent => f.write_str("entity is not present in this storage"),
            Self::Empty => f.write_str("storage is empty"),
            Self::ParentMissing => f.write_str("parent entity is not present in this storage"),
            Self::IteratorInvalidated => {
                f.write_str("storage was mutated while an iterator over it was still live")
            }
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}
