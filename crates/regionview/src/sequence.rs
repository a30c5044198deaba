//! The materialized output of a projection.

use std::fmt;
use std::sync::Arc;

use crate::item::ItemId;

/// The filtered, ordered payloads a projection exposes.
///
/// Entries remember which item they came from so positions can be looked up
/// by item identity even when two items share a payload. Only the engine
/// mutates a `ProjectedSequence`; observers get read access.
pub struct ProjectedSequence<T> {
    entries: Vec<(ItemId, Arc<T>)>,
}

impl<T> ProjectedSequence<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn from_entries(entries: Vec<(ItemId, Arc<T>)>) -> Self {
        Self { entries }
    }

    pub(crate) fn remove(&mut self, index: usize) -> (ItemId, Arc<T>) {
        self.entries.remove(index)
    }

    pub(crate) fn entries(&self) -> &[(ItemId, Arc<T>)] {
        &self.entries
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the payload at `index`.
    pub fn get(&self, index: usize) -> Option<&Arc<T>> {
        self.entries.get(index).map(|(_, payload)| payload)
    }

    /// Returns `true` if `payload` (by identity) is in the projection.
    pub fn contains(&self, payload: &Arc<T>) -> bool {
        self.position(payload).is_some()
    }

    /// Position of the first entry whose payload is `payload` (by identity).
    pub fn position(&self, payload: &Arc<T>) -> Option<usize> {
        self.entries
            .iter()
            .position(|(_, candidate)| Arc::ptr_eq(candidate, payload))
    }

    /// Position of the entry contributed by the item with identity `id`.
    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.entries.iter().position(|(entry_id, _)| *entry_id == id)
    }

    /// Iterates over the payloads in projection order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> + '_ {
        self.entries.iter().map(|(_, payload)| payload)
    }

    /// Returns a copy of the payloads in projection order.
    pub fn to_vec(&self) -> Vec<Arc<T>> {
        self.iter().cloned().collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for ProjectedSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
