//! Tagged items: a payload plus the classification state filters read.
//!
//! A [`TaggedItem`] is what a [`SourceSequence`](crate::SourceSequence)
//! holds. The payload is opaque to the engine and compared by identity; the
//! classification state (active flag, name) belongs to the item, and every
//! change to it is announced on [`TaggedItem::classification_changed`] so a
//! projection can re-evaluate its filter for just that item.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use regionview_core::{Property, Signal};

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`TaggedItem`].
///
/// IDs are never reused, so an ID held past the item's lifetime cannot be
/// confused with a newer item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    fn next() -> Self {
        Self(NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An opaque payload plus mutable classification state.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use regionview::TaggedItem;
///
/// let item = Arc::new(TaggedItem::new("settings-view").with_name("settings"));
/// item.classification_changed().connect(|_| println!("reclassify"));
///
/// assert!(item.set_active(true));   // emits
/// assert!(!item.set_active(true));  // unchanged, no emit
/// ```
pub struct TaggedItem<T> {
    id: ItemId,
    payload: Arc<T>,
    is_active: Property<bool>,
    name: Property<Option<String>>,
    classification_changed: Signal<()>,
}

static_assertions::assert_impl_all!(TaggedItem<String>: Send, Sync);

impl<T> TaggedItem<T> {
    /// Creates an inactive, unnamed item owning `payload`.
    pub fn new(payload: T) -> Self {
        Self::from_arc(Arc::new(payload))
    }

    /// Creates an inactive, unnamed item around an already shared payload.
    pub fn from_arc(payload: Arc<T>) -> Self {
        Self {
            id: ItemId::next(),
            payload,
            is_active: Property::new(false),
            name: Property::new(None),
            classification_changed: Signal::new(),
        }
    }

    /// Creates an item that starts out active.
    pub fn active(payload: T) -> Self {
        let item = Self::new(payload);
        item.is_active.set_silent(true);
        item
    }

    /// Sets the initial name. Does not emit.
    pub fn with_name(self, name: impl Into<String>) -> Self {
        self.name.set_silent(Some(name.into()));
        self
    }

    /// Returns this item's identity.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Returns the shared payload.
    pub fn payload(&self) -> &Arc<T> {
        &self.payload
    }

    pub fn is_active(&self) -> bool {
        self.is_active.get()
    }

    /// Sets the active flag, emitting `classification_changed` if it changed.
    ///
    /// Returns `true` if the value changed.
    pub fn set_active(&self, active: bool) -> bool {
        let changed = self.is_active.set(active);
        if changed {
            self.classification_changed.emit(());
        }
        changed
    }

    pub fn name(&self) -> Option<String> {
        self.name.get()
    }

    /// Returns `true` if the item's name equals `name`.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.with(|current| current.as_deref() == Some(name))
    }

    /// Sets or clears the name, emitting `classification_changed` if it changed.
    pub fn set_name(&self, name: Option<String>) -> bool {
        let changed = self.name.set(name);
        if changed {
            self.classification_changed.emit(());
        }
        changed
    }

    /// Announces that state a filter may read has changed.
    ///
    /// Use this when a predicate depends on state outside the item's own
    /// properties, e.g. fields behind interior mutability in the payload.
    pub fn notify_classification_changed(&self) {
        self.classification_changed.emit(());
    }

    /// The signal emitted whenever classification state changes.
    pub fn classification_changed(&self) -> &Signal<()> {
        &self.classification_changed
    }
}

impl<T: fmt::Debug> fmt::Debug for TaggedItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedItem")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .field("is_active", &self.is_active())
            .field("name", &self.name())
            .finish()
    }
}
