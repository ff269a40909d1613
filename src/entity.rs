//! Entity identity.

use crate::error::Error;
use core::fmt;
use core::num::NonZeroU64;

/// A positive integer identity, opaque to every storage.
///
/// `EntityId` deliberately carries no generation or liveness bits: retired
/// id recycling and garbage collection belong to the world object that owns
/// the id allocator, not to the storages in this crate (see the crate-level
/// Non-goals).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct EntityId(NonZeroU64);

impl EntityId {
    /// Builds an `EntityId` from a raw value.
    ///
    /// Fails with [`Error::InvalidId`] when `raw` is `0`; ids are 1-based so
    /// that a packed-position slot of `0` can mean "absent" (see
    /// [`crate::sparse_set`]).
    #[inline]
    pub fn new(raw: u64) -> Result<Self, Error> {
        NonZeroU64::new(raw).map(EntityId).ok_or(Error::InvalidId)
    }

    /// Returns the raw value, counting from `1`.
    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// 0-based index usable to address a sparse-array page: `get() - 1`.
    #[inline]
    pub(crate) fn index(self) -> u64 {
        self.0.get() - 1
    }

    /// Which page of `PAGE_LEN` entries this id falls into.
    #[inline]
    pub fn page(self) -> usize {
        (self.index() / crate::sparse_set::PAGE_LEN as u64) as usize
    }

    /// Offset within its page.
    #[inline]
    pub fn page_offset(self) -> usize {
        (self.index() % crate::sparse_set::PAGE_LEN as u64) as usize
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0.get())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.get(), f)
    }
}

impl TryFrom<u64> for EntityId {
    type Error = Error;

    #[inline]
    fn try_from(raw: u64) -> Result<Self, Error> {
        EntityId::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero() {
        assert_eq!(EntityId::new(0), Err(Error::InvalidId));
    }

    #[test]
    fn round_trips_raw_value() {
        let id = EntityId::new(42).unwrap();
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn page_math_matches_page_len() {
        let page_len = crate::sparse_set::PAGE_LEN as u64;
        let first_of_second_page = EntityId::new(page_len + 1).unwrap();
        assert_eq!(first_of_second_page.page(), 1);
        assert_eq!(first_of_second_page.page_offset(), 0);

        let last_of_first_page = EntityId::new(page_len).unwrap();
        assert_eq!(last_of_first_page.page(), 0);
        assert_eq!(last_of_first_page.page_offset() as u64, page_len - 1);
    }
}
