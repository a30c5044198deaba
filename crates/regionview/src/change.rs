//! Notifications emitted by a projection.

use std::fmt;
use std::sync::Arc;

/// The change a projection reports to its observers.
///
/// `Add` and `Remove` indices are valid against the projection as it stood
/// immediately before the notification was delivered. `Reset` means the
/// observer must discard its copy and re-read the projection in full.
pub enum ProjectionChange<T> {
    /// `item` now sits at `index`.
    Add { item: Arc<T>, index: usize },
    /// `item` was at `index` and is gone.
    Remove { item: Arc<T>, index: usize },
    /// Anything may have changed.
    Reset,
}

impl<T> ProjectionChange<T> {
    /// The payload an `Add` or `Remove` refers to.
    pub fn item(&self) -> Option<&Arc<T>> {
        match self {
            Self::Add { item, .. } | Self::Remove { item, .. } => Some(item),
            Self::Reset => None,
        }
    }

    /// The position an `Add` or `Remove` refers to.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Add { index, .. } | Self::Remove { index, .. } => Some(*index),
            Self::Reset => None,
        }
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }
}

impl<T> Clone for ProjectionChange<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Add { item, index } => Self::Add {
                item: Arc::clone(item),
                index: *index,
            },
            Self::Remove { item, index } => Self::Remove {
                item: Arc::clone(item),
                index: *index,
            },
            Self::Reset => Self::Reset,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ProjectionChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { item, index } => f
                .debug_struct("Add")
                .field("item", item)
                .field("index", index)
                .finish(),
            Self::Remove { item, index } => f
                .debug_struct("Remove")
                .field("item", item)
                .field("index", index)
                .finish(),
            Self::Reset => f.write_str("Reset"),
        }
    }
}
