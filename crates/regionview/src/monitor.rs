//! Per-item subscription and classification bookkeeping.
//!
//! The table maps each monitored item's identity to its last known filter
//! result and the connection the engine holds on the item's
//! `classification_changed` signal. An entry owns that connection: the only
//! way to get rid of an entry is to take it out of the table and
//! [`release`](MonitorEntry::release) it, which consumes it. A subscription
//! therefore cannot be released twice, and every removal path hands back the
//! entry that must be released.

use std::collections::HashMap;
use std::sync::Arc;

use regionview_core::ConnectionId;

use crate::item::{ItemId, TaggedItem};

/// One monitored item.
pub(crate) struct MonitorEntry<T> {
    item: Arc<TaggedItem<T>>,
    connection: ConnectionId,
    included: bool,
}

impl<T> MonitorEntry<T> {
    pub(crate) fn new(item: Arc<TaggedItem<T>>, connection: ConnectionId, included: bool) -> Self {
        Self {
            item,
            connection,
            included,
        }
    }

    pub(crate) fn item(&self) -> &Arc<TaggedItem<T>> {
        &self.item
    }

    pub(crate) fn included(&self) -> bool {
        self.included
    }

    /// Disconnects from the item's classification signal.
    ///
    /// Returns `false` if the connection was already gone, which means someone
    /// else disconnected it behind the table's back.
    pub(crate) fn release(self) -> bool {
        self.item.classification_changed().disconnect(self.connection)
    }
}

/// Identity-keyed table of monitored items.
pub(crate) struct MonitorTable<T> {
    entries: HashMap<ItemId, MonitorEntry<T>>,
}

impl<T> MonitorTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn contains(&self, id: ItemId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn get(&self, id: ItemId) -> Option<&MonitorEntry<T>> {
        self.entries.get(&id)
    }

    /// Last known filter result, or `None` if the item is not monitored.
    pub(crate) fn included(&self, id: ItemId) -> Option<bool> {
        self.entries.get(&id).map(MonitorEntry::included)
    }

    /// Records a new filter result and returns the previous one.
    ///
    /// Returns `None` (and records nothing) if the item is not monitored.
    pub(crate) fn set_included(&mut self, id: ItemId, included: bool) -> Option<bool> {
        self.entries
            .get_mut(&id)
            .map(|entry| std::mem::replace(&mut entry.included, included))
    }

    /// Inserts an entry, handing back any entry it displaced.
    #[must_use = "a displaced entry still holds a live connection"]
    pub(crate) fn insert(&mut self, entry: MonitorEntry<T>) -> Option<MonitorEntry<T>> {
        self.entries.insert(entry.item.id(), entry)
    }

    /// Takes an entry out of the table.
    #[must_use = "a removed entry still holds a live connection"]
    pub(crate) fn remove(&mut self, id: ItemId) -> Option<MonitorEntry<T>> {
        self.entries.remove(&id)
    }

    /// Takes every entry out of the table.
    #[must_use = "drained entries still hold live connections"]
    pub(crate) fn drain(&mut self) -> Vec<MonitorEntry<T>> {
        self.entries.drain().map(|(_, entry)| entry).collect()
    }
}
