//! The authoritative, observable sequence of tagged items.
//!
//! `SourceSequence<T>` owns the ordered list of [`TaggedItem`]s and announces
//! every structural mutation on [`SourceSequence::changed`]. Notifications
//! are classified into exactly three shapes (see [`SourceChange`]) and are
//! emitted after the internal lock is released, so observers may read the
//! sequence from inside their slot.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use regionview_core::Signal;
use regionview_core::logging::targets;

use crate::error::{Error, Result};
use crate::item::{ItemId, TaggedItem};

/// A structural change to a [`SourceSequence`].
pub enum SourceChange<T> {
    /// Items were inserted. `at_end` is `true` when they were appended.
    Added {
        items: Vec<Arc<TaggedItem<T>>>,
        at_end: bool,
    },
    /// Items were removed.
    Removed { items: Vec<Arc<TaggedItem<T>>> },
    /// Replace, move, clear, or any change without positional semantics.
    Other,
}

impl<T> Clone for SourceChange<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Added { items, at_end } => Self::Added {
                items: items.clone(),
                at_end: *at_end,
            },
            Self::Removed { items } => Self::Removed {
                items: items.clone(),
            },
            Self::Other => Self::Other,
        }
    }
}

impl<T> fmt::Debug for SourceChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added { items, at_end } => f
                .debug_struct("Added")
                .field("items", &item_ids(items))
                .field("at_end", at_end)
                .finish(),
            Self::Removed { items } => f
                .debug_struct("Removed")
                .field("items", &item_ids(items))
                .finish(),
            Self::Other => f.write_str("Other"),
        }
    }
}

fn item_ids<T>(items: &[Arc<TaggedItem<T>>]) -> Vec<ItemId> {
    items.iter().map(|i| i.id()).collect()
}

/// An ordered, observable collection of [`TaggedItem`]s.
///
/// Each item may appear at most once (by identity). Every successful mutation
/// emits exactly one [`SourceChange`]; rejected mutations emit nothing and
/// leave the sequence untouched.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use regionview::{SourceSequence, TaggedItem};
///
/// let source: Arc<SourceSequence<&str>> = Arc::new(SourceSequence::new());
/// source.changed().connect(|change| {
///     println!("source changed: {:?}", change);
/// });
///
/// source.push(Arc::new(TaggedItem::active("home"))).unwrap();
/// assert_eq!(source.len(), 1);
/// ```
pub struct SourceSequence<T> {
    items: RwLock<Vec<Arc<TaggedItem<T>>>>,
    changed: Signal<SourceChange<T>>,
}

impl<T> Default for SourceSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SourceSequence<T> {
    /// Creates an empty sequence.
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            changed: Signal::new(),
        }
    }

    /// Creates a sequence pre-populated with `items`. Does not emit.
    pub fn with_items(items: Vec<Arc<TaggedItem<T>>>) -> Result<Self> {
        ensure_distinct(&[], &items)?;
        Ok(Self {
            items: RwLock::new(items),
            changed: Signal::new(),
        })
    }

    /// The signal carrying structural change notifications.
    pub fn changed(&self) -> &Signal<SourceChange<T>> {
        &self.changed
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> Option<Arc<TaggedItem<T>>> {
        self.items.read().get(index).cloned()
    }

    /// Returns `true` if `item` (by identity) is in the sequence.
    pub fn contains(&self, item: &TaggedItem<T>) -> bool {
        self.position(item.id()).is_some()
    }

    /// Returns the index of the item with the given identity.
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.read().iter().position(|i| i.id() == id)
    }

    /// Returns the first item whose name equals `name`.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<TaggedItem<T>>> {
        self.items.read().iter().find(|i| i.has_name(name)).cloned()
    }

    /// Returns a copy of the current contents, in order.
    pub fn snapshot(&self) -> Vec<Arc<TaggedItem<T>>> {
        self.items.read().clone()
    }

    /// Appends an item.
    pub fn push(&self, item: Arc<TaggedItem<T>>) -> Result<()> {
        self.extend(vec![item])
    }

    /// Appends a batch of items, announced as a single `Added` notification.
    pub fn extend(&self, new_items: Vec<Arc<TaggedItem<T>>>) -> Result<()> {
        if new_items.is_empty() {
            return Ok(());
        }
        {
            let mut items = self.items.write();
            ensure_distinct(&items, &new_items)?;
            items.extend(new_items.iter().cloned());
        }
        tracing::trace!(target: targets::SOURCE, count = new_items.len(), "items appended");
        self.changed.emit(SourceChange::Added {
            items: new_items,
            at_end: true,
        });
        Ok(())
    }

    /// Inserts an item at `index`, shifting later items back.
    pub fn insert(&self, index: usize, item: Arc<TaggedItem<T>>) -> Result<()> {
        let at_end = {
            let mut items = self.items.write();
            if index > items.len() {
                return Err(Error::out_of_bounds(index, items.len()));
            }
            ensure_distinct(&items, std::slice::from_ref(&item))?;
            let at_end = index == items.len();
            items.insert(index, Arc::clone(&item));
            at_end
        };
        tracing::trace!(target: targets::SOURCE, index, id = %item.id(), "item inserted");
        self.changed.emit(SourceChange::Added {
            items: vec![item],
            at_end,
        });
        Ok(())
    }

    /// Removes `item` (by identity). Returns `false` if it was not present.
    pub fn remove(&self, item: &TaggedItem<T>) -> bool {
        let removed = {
            let mut items = self.items.write();
            match items.iter().position(|i| i.id() == item.id()) {
                Some(index) => items.remove(index),
                None => return false,
            }
        };
        self.emit_removed(vec![removed]);
        true
    }

    /// Removes and returns the item at `index`.
    pub fn remove_at(&self, index: usize) -> Result<Arc<TaggedItem<T>>> {
        let removed = {
            let mut items = self.items.write();
            if index >= items.len() {
                return Err(Error::out_of_bounds(index, items.len()));
            }
            items.remove(index)
        };
        self.emit_removed(vec![Arc::clone(&removed)]);
        Ok(removed)
    }

    /// Removes every listed item that is present, announced as one batch.
    ///
    /// Returns the number of items removed.
    pub fn remove_many(&self, wanted: &[Arc<TaggedItem<T>>]) -> usize {
        let removed: Vec<_> = {
            let mut items = self.items.write();
            let mut removed = Vec::new();
            for target in wanted {
                if let Some(index) = items.iter().position(|i| i.id() == target.id()) {
                    removed.push(items.remove(index));
                }
            }
            removed
        };
        let count = removed.len();
        if count > 0 {
            self.emit_removed(removed);
        }
        count
    }

    /// Replaces the item at `index`, returning the old one.
    pub fn replace(&self, index: usize, item: Arc<TaggedItem<T>>) -> Result<Arc<TaggedItem<T>>> {
        let old = {
            let mut items = self.items.write();
            if index >= items.len() {
                return Err(Error::out_of_bounds(index, items.len()));
            }
            if items[index].id() != item.id() {
                ensure_distinct(&items, std::slice::from_ref(&item))?;
            }
            std::mem::replace(&mut items[index], item)
        };
        self.emit_other("replace");
        Ok(old)
    }

    /// Moves the item at `from` so that it ends up at index `to`.
    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        {
            let mut items = self.items.write();
            let len = items.len();
            if from >= len {
                return Err(Error::out_of_bounds(from, len));
            }
            if to >= len {
                return Err(Error::out_of_bounds(to, len));
            }
            let item = items.remove(from);
            items.insert(to, item);
        }
        self.emit_other("move");
        Ok(())
    }

    /// Removes every item.
    pub fn clear(&self) {
        self.items.write().clear();
        self.emit_other("clear");
    }

    /// Replaces the whole contents.
    pub fn reset(&self, new_items: Vec<Arc<TaggedItem<T>>>) -> Result<()> {
        ensure_distinct(&[], &new_items)?;
        *self.items.write() = new_items;
        self.emit_other("reset");
        Ok(())
    }

    fn emit_removed(&self, items: Vec<Arc<TaggedItem<T>>>) {
        tracing::trace!(target: targets::SOURCE, count = items.len(), "items removed");
        self.changed.emit(SourceChange::Removed { items });
    }

    fn emit_other(&self, operation: &'static str) {
        tracing::trace!(target: targets::SOURCE, operation, "structural change without positions");
        self.changed.emit(SourceChange::Other);
    }
}

impl<T> fmt::Debug for SourceSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSequence")
            .field("len", &self.items.read().len())
            .field("observers", &self.changed.connection_count())
            .finish()
    }
}

/// Rejects `incoming` if any item is already in `existing` or repeats.
fn ensure_distinct<T>(existing: &[Arc<TaggedItem<T>>], incoming: &[Arc<TaggedItem<T>>]) -> Result<()> {
    for (i, item) in incoming.iter().enumerate() {
        let id = item.id();
        let repeated = incoming[..i].iter().any(|other| other.id() == id);
        if repeated || existing.iter().any(|other| other.id() == id) {
            return Err(Error::duplicate(id));
        }
    }
    Ok(())
}
