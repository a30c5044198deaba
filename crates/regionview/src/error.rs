//! Error types for regionview.

use crate::item::ItemId;

/// Result type alias for regionview operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised at the call boundary of a projection or source mutation.
///
/// These are programming errors: the offending call is rejected before any
/// state changes and no notification is emitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A projection was built without a filter predicate.
    #[error("projection requires a filter predicate")]
    MissingFilter,

    /// The source sequence was dropped before the projection was built.
    #[error("source sequence has already been dropped")]
    SourceDropped,

    /// The same item (by identity) would appear twice in the source sequence.
    #[error("item {id} is already present in the source sequence")]
    DuplicateItem { id: ItemId },

    /// A positional source mutation was out of range.
    #[error("index {index} is out of bounds for source of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

impl Error {
    /// Create a duplicate-item error.
    pub fn duplicate(id: ItemId) -> Self {
        Self::DuplicateItem { id }
    }

    /// Create an out-of-bounds error.
    pub fn out_of_bounds(index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds { index, len }
    }
}
