//! Live filtered and sorted projection over a [`SourceSequence`].
//!
//! [`ProjectionEngine`] observes a source sequence and each item in it, keeps
//! a [`ProjectedSequence`] equal to `sort(filter(source))`, and tells its
//! observers what changed using the smallest notification it can compute
//! exactly:
//!
//! | trigger                              | notification                        |
//! |--------------------------------------|-------------------------------------|
//! | item starts passing the filter       | `Add(item, new index)`              |
//! | item stops passing the filter        | `Remove(item, old index)`           |
//! | items appended/inserted, unsorted    | one `Add` per newly shown item, ascending |
//! | items appended/inserted, sorted      | `Reset`                             |
//! | items removed                        | one `Remove` per previously shown item |
//! | replace / move / clear / reset       | `Reset`                             |
//! | comparator set or cleared            | `Reset`                             |
//!
//! # Reentrancy
//!
//! Everything runs synchronously on the caller's thread. No internal lock is
//! held while a predicate, comparator, item signal, or observer runs, so any
//! of them may read the projection or trigger further changes. A
//! classification signal for an item the engine no longer monitors is
//! ignored.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use regionview::{ProjectionChange, ProjectionEngine, SourceSequence, TaggedItem, filters};
//!
//! let source = Arc::new(SourceSequence::new());
//! let a = Arc::new(TaggedItem::active("a"));
//! let b = Arc::new(TaggedItem::new("b"));
//! source.extend(vec![a.clone(), b.clone()]).unwrap();
//!
//! let active_views = ProjectionEngine::with_filter(&source, filters::active());
//! assert_eq!(active_views.len(), 1);
//!
//! active_views.changed().connect(|change| {
//!     if let ProjectionChange::Add { item, index } = change {
//!         println!("{} shown at {}", item, index);
//!     }
//! });
//! b.set_active(true); // prints "b shown at 1"
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use regionview_core::logging::targets;
use regionview_core::{ConnectionId, PerfSpan, Signal};

use crate::change::ProjectionChange;
use crate::error::{Error, Result};
use crate::item::{ItemId, TaggedItem};
use crate::monitor::{MonitorEntry, MonitorTable};
use crate::sequence::ProjectedSequence;
use crate::source::{SourceChange, SourceSequence};

/// Type alias for a filter predicate.
///
/// Returns `true` if the item belongs in the projection.
pub type FilterFn<T> = Arc<dyn Fn(&TaggedItem<T>) -> bool + Send + Sync>;

/// Type alias for a payload comparator.
pub type CompareFn<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Shared engine state. Slots connected to the source and to items hold a
/// `Weak` to this, never a strong reference.
struct EngineInner<T> {
    source: Weak<SourceSequence<T>>,
    source_connection: Mutex<Option<ConnectionId>>,
    filter: FilterFn<T>,
    compare: RwLock<Option<CompareFn<T>>>,
    monitors: Mutex<MonitorTable<T>>,
    projected: RwLock<ProjectedSequence<T>>,
    changed: Signal<ProjectionChange<T>>,
}

impl<T: Send + Sync + 'static> EngineInner<T> {
    fn source_items(&self) -> Vec<Arc<TaggedItem<T>>> {
        self.source
            .upgrade()
            .map(|source| source.snapshot())
            .unwrap_or_default()
    }

    fn has_comparator(&self) -> bool {
        self.compare.read().is_some()
    }

    fn notify(&self, change: ProjectionChange<T>) {
        match &change {
            ProjectionChange::Add { index, .. } => {
                tracing::trace!(target: targets::PROJECTION, index, "add");
            }
            ProjectionChange::Remove { index, .. } => {
                tracing::trace!(target: targets::PROJECTION, index, "remove");
            }
            ProjectionChange::Reset => {
                tracing::debug!(target: targets::PROJECTION, "reset");
            }
        }
        self.changed.emit(change);
    }

    /// Subscribes to `item`, classifies it, and records it in the table.
    fn monitor(self: &Arc<Self>, item: &Arc<TaggedItem<T>>) {
        let weak = Arc::downgrade(self);
        let id = item.id();
        let connection = item.classification_changed().connect(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.on_classification_changed(id);
            }
        });

        // The predicate may re-enter through the connection made above; the
        // item is not in the table yet, so that call is ignored.
        let included = (self.filter)(&**item);

        let displaced = self
            .monitors
            .lock()
            .insert(MonitorEntry::new(Arc::clone(item), connection, included));
        if let Some(old) = displaced {
            tracing::warn!(target: targets::PROJECTION, id = %id, "item monitored twice; releasing the older subscription");
            old.release();
        }
    }

    fn monitor_all(self: &Arc<Self>) {
        for item in self.source_items() {
            self.monitor(&item);
        }
    }

    /// Rebuilds the projection from the source order and the recorded filter
    /// results. Items not yet classified count as excluded.
    fn recompute(&self) {
        let _span = PerfSpan::new("projection.recompute");
        let items = self.source_items();

        let mut entries: Vec<(ItemId, Arc<T>)> = {
            let monitors = self.monitors.lock();
            items
                .iter()
                .filter(|item| monitors.included(item.id()) == Some(true))
                .map(|item| (item.id(), Arc::clone(item.payload())))
                .collect()
        };

        let compare = self.compare.read().clone();
        if let Some(compare) = compare {
            // Stable, so ties keep source order.
            entries.sort_by(|(_, a), (_, b)| compare(&**a, &**b));
        }

        *self.projected.write() = ProjectedSequence::from_entries(entries);
    }

    fn on_source_change(self: &Arc<Self>, change: &SourceChange<T>) {
        match change {
            SourceChange::Added { items, at_end } => {
                tracing::trace!(target: targets::PROJECTION, count = items.len(), at_end, "source added");
                self.on_source_added(items);
            }
            SourceChange::Removed { items } => self.on_source_removed(items),
            SourceChange::Other => self.on_source_other(),
        }
    }

    fn on_classification_changed(&self, id: ItemId) {
        let known = self
            .monitors
            .lock()
            .get(id)
            .map(|entry| (Arc::clone(entry.item()), entry.included()));
        let Some((item, was_included)) = known else {
            tracing::trace!(target: targets::PROJECTION, id = %id, "classification change for unmonitored item ignored");
            return;
        };

        let is_included = (self.filter)(&*item);
        if is_included == was_included {
            return;
        }

        // Re-read under the lock: the predicate may have re-entered and either
        // recorded this transition already or detached the item.
        let previous = self.monitors.lock().set_included(id, is_included);
        match previous {
            None => {
                tracing::trace!(target: targets::PROJECTION, id = %id, "item detached during classification");
                return;
            }
            Some(previous) if previous == is_included => return,
            Some(_) => {}
        }

        if is_included {
            self.recompute();
            let index = self.projected.read().position_of(id);
            match index {
                Some(index) => self.notify(ProjectionChange::Add {
                    item: Arc::clone(item.payload()),
                    index,
                }),
                None => self.degrade_to_reset(id),
            }
        } else {
            let index = self.projected.read().position_of(id);
            self.recompute();
            match index {
                Some(index) => self.notify(ProjectionChange::Remove {
                    item: Arc::clone(item.payload()),
                    index,
                }),
                None => self.degrade_to_reset(id),
            }
        }
    }

    fn on_source_added(self: &Arc<Self>, items: &[Arc<TaggedItem<T>>]) {
        let before: Vec<ItemId> = self.projected.read().ids().collect();

        // Predicates may reclassify other items while the batch is being
        // classified. Their notifications are held back and folded into the
        // difference computed below.
        let was_blocked = self.changed.is_blocked();
        self.changed.set_blocked(true);
        for item in items {
            self.monitor(item);
        }
        self.changed.set_blocked(was_blocked);
        self.recompute();

        if self.has_comparator() {
            self.notify(ProjectionChange::Reset);
            return;
        }

        let shown: HashSet<ItemId> = before.iter().copied().collect();
        let added: Option<Vec<(usize, Arc<T>)>> = {
            let projected = self.projected.read();
            let kept: Vec<ItemId> = projected.ids().filter(|id| shown.contains(id)).collect();
            (kept == before).then(|| {
                projected
                    .entries()
                    .iter()
                    .enumerate()
                    .filter(|(_, (id, _))| !shown.contains(id))
                    .map(|(index, (_, payload))| (index, Arc::clone(payload)))
                    .collect()
            })
        };

        match added {
            Some(added) => {
                for (index, item) in added {
                    self.notify(ProjectionChange::Add { item, index });
                }
            }
            None => {
                tracing::debug!(target: targets::PROJECTION, "shown items changed while classifying a batch");
                self.notify(ProjectionChange::Reset);
            }
        }
    }

    fn on_source_removed(&self, items: &[Arc<TaggedItem<T>>]) {
        for item in items {
            let id = item.id();
            let entry = self.monitors.lock().remove(id);
            let Some(entry) = entry else {
                tracing::trace!(target: targets::PROJECTION, id = %id, "removed item was not monitored");
                continue;
            };
            let was_included = entry.included();
            if !entry.release() {
                tracing::warn!(target: targets::PROJECTION, id = %id, "subscription was already released");
            }
            if !was_included {
                continue;
            }

            let removed_at = {
                let mut projected = self.projected.write();
                let index = projected.position_of(id);
                if let Some(index) = index {
                    projected.remove(index);
                }
                index
            };
            match removed_at {
                Some(index) => self.notify(ProjectionChange::Remove {
                    item: Arc::clone(item.payload()),
                    index,
                }),
                None => {
                    self.recompute();
                    self.degrade_to_reset(id);
                }
            }
        }
    }

    fn on_source_other(self: &Arc<Self>) {
        // Observers still hold the old projection, so positional changes
        // raised by predicates during the rebuild would not apply to it. The
        // closing `Reset` covers them.
        let was_blocked = self.changed.is_blocked();
        self.changed.set_blocked(true);
        let released = self.release_all();
        self.monitor_all();
        self.recompute();
        self.changed.set_blocked(was_blocked);
        tracing::debug!(
            target: targets::PROJECTION,
            released,
            monitored = self.monitors.lock().len(),
            "rebuilt monitors after unpositioned source change"
        );
        self.notify(ProjectionChange::Reset);
    }

    fn set_comparator(&self, compare: Option<CompareFn<T>>) {
        let same_reference = match (&*self.compare.read(), &compare) {
            (Some(current), Some(next)) => Arc::ptr_eq(current, next),
            (None, None) => true,
            _ => false,
        };
        *self.compare.write() = compare;
        self.recompute();
        tracing::debug!(target: targets::PROJECTION, same_reference, "comparator replaced");
        self.notify(ProjectionChange::Reset);
    }

    /// Falls back to a full refresh when a precise index cannot be produced.
    fn degrade_to_reset(&self, id: ItemId) {
        tracing::warn!(target: targets::PROJECTION, id = %id, "transitioned item missing from projection; resetting");
        self.notify(ProjectionChange::Reset);
    }
}

impl<T> EngineInner<T> {
    /// Releases every item subscription and empties the monitor table.
    fn release_all(&self) -> usize {
        let entries = self.monitors.lock().drain();
        let count = entries.len();
        for entry in entries {
            let id = entry.item().id();
            if !entry.release() {
                tracing::warn!(target: targets::PROJECTION, id = %id, "subscription was already released");
            }
        }
        count
    }

    /// Drops the source subscription and every item subscription.
    fn detach(&self) {
        if let Some(connection) = self.source_connection.lock().take() {
            if let Some(source) = self.source.upgrade() {
                source.changed().disconnect(connection);
            }
        }
        let released = self.release_all();
        tracing::debug!(target: targets::PROJECTION, released, "projection detached");
    }
}

/// A live, filtered, optionally sorted view of a [`SourceSequence`].
///
/// The engine does not own the source: it keeps a weak reference plus its
/// subscription, both released when the engine is dropped. If the source is
/// dropped first, the next rebuild treats it as empty.
pub struct ProjectionEngine<T> {
    inner: Arc<EngineInner<T>>,
}

static_assertions::assert_impl_all!(ProjectionEngine<String>: Send, Sync);

impl<T: Send + Sync + 'static> ProjectionEngine<T> {
    /// Creates a projection of `source` filtered by `filter`, in source order.
    pub fn new<F>(source: &Arc<SourceSequence<T>>, filter: F) -> Self
    where
        F: Fn(&TaggedItem<T>) -> bool + Send + Sync + 'static,
    {
        Self::attach(source, Arc::new(filter), None)
    }

    /// Creates a projection from an already shared predicate.
    pub fn with_filter(source: &Arc<SourceSequence<T>>, filter: FilterFn<T>) -> Self {
        Self::attach(source, filter, None)
    }

    /// Returns a builder for a projection of `source`.
    pub fn builder(source: &Arc<SourceSequence<T>>) -> ProjectionBuilder<T> {
        ProjectionBuilder::new(source)
    }

    fn attach(
        source: &Arc<SourceSequence<T>>,
        filter: FilterFn<T>,
        compare: Option<CompareFn<T>>,
    ) -> Self {
        let inner = Arc::new(EngineInner {
            source: Arc::downgrade(source),
            source_connection: Mutex::new(None),
            filter,
            compare: RwLock::new(compare),
            monitors: Mutex::new(MonitorTable::new()),
            projected: RwLock::new(ProjectedSequence::new()),
            changed: Signal::new(),
        });

        inner.monitor_all();
        inner.recompute();

        let weak = Arc::downgrade(&inner);
        let connection = source.changed().connect(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_source_change(change);
            }
        });
        *inner.source_connection.lock() = Some(connection);

        tracing::debug!(
            target: targets::PROJECTION,
            monitored = inner.monitors.lock().len(),
            projected = inner.projected.read().len(),
            sorted = inner.has_comparator(),
            "projection attached"
        );
        Self { inner }
    }

    /// The signal carrying [`ProjectionChange`] notifications.
    pub fn changed(&self) -> &Signal<ProjectionChange<T>> {
        &self.inner.changed
    }

    /// Replaces the comparator, re-sorts, and emits `Reset`.
    ///
    /// The `Reset` is emitted even when `compare` is the comparator already
    /// in use. Callers that want to skip the refresh must compare first.
    pub fn set_comparator(&self, compare: CompareFn<T>) {
        self.inner.set_comparator(Some(compare));
    }

    /// Like [`set_comparator`](Self::set_comparator), from a closure.
    pub fn set_sort<F>(&self, compare: F)
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.set_comparator(Arc::new(compare));
    }

    /// Returns to source order and emits `Reset`.
    pub fn clear_comparator(&self) {
        self.inner.set_comparator(None);
    }

    /// The comparator currently in use.
    pub fn comparator(&self) -> Option<CompareFn<T>> {
        self.inner.compare.read().clone()
    }

    pub fn has_comparator(&self) -> bool {
        self.inner.has_comparator()
    }

    /// Re-evaluates the filter for `item` after its classification changed.
    ///
    /// Connected automatically to every monitored item; calling it for an
    /// item the engine does not monitor does nothing.
    pub fn on_classification_changed(&self, item: &TaggedItem<T>) {
        self.inner.on_classification_changed(item.id());
    }

    /// Starts monitoring `items` and reports the ones that pass the filter.
    ///
    /// Connected automatically to the source's `Added` notifications.
    pub fn on_source_added(&self, items: &[Arc<TaggedItem<T>>]) {
        self.inner.on_source_added(items);
    }

    /// Stops monitoring `items` and reports the ones that were shown.
    ///
    /// Connected automatically to the source's `Removed` notifications.
    pub fn on_source_removed(&self, items: &[Arc<TaggedItem<T>>]) {
        self.inner.on_source_removed(items);
    }

    /// Rebuilds monitoring and the projection from scratch and emits `Reset`.
    ///
    /// Connected automatically to the source's `Other` notifications.
    pub fn on_source_other(&self) {
        self.inner.on_source_other();
    }

    /// A copy of the projected payloads, in order.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.inner.projected.read().to_vec()
    }

    /// Runs `f` with read access to the projection.
    ///
    /// The projection is locked for reading while `f` runs; `f` must not
    /// mutate the source or the engine.
    pub fn with_projected<R>(&self, f: impl FnOnce(&ProjectedSequence<T>) -> R) -> R {
        f(&self.inner.projected.read())
    }

    pub fn len(&self) -> usize {
        self.inner.projected.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.projected.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.inner.projected.read().get(index).cloned()
    }

    /// Returns `true` if `payload` (by identity) is currently projected.
    pub fn contains(&self, payload: &Arc<T>) -> bool {
        self.inner.projected.read().contains(payload)
    }

    pub fn position(&self, payload: &Arc<T>) -> Option<usize> {
        self.inner.projected.read().position(payload)
    }

    /// Returns `true` if the engine holds a subscription on `item`.
    pub fn is_monitored(&self, item: &TaggedItem<T>) -> bool {
        self.inner.monitors.lock().contains(item.id())
    }

    /// The last recorded filter result for `item`.
    pub fn included(&self, item: &TaggedItem<T>) -> Option<bool> {
        self.inner.monitors.lock().included(item.id())
    }

    pub fn monitored_count(&self) -> usize {
        self.inner.monitors.lock().len()
    }

    /// A weak, read-only handle to this projection.
    pub fn reader(&self) -> ProjectionReader<T> {
        ProjectionReader {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl<T> Drop for ProjectionEngine<T> {
    fn drop(&mut self) {
        self.inner.detach();
    }
}

impl<T> fmt::Debug for ProjectionEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectionEngine")
            .field("projected", &self.inner.projected.read().len())
            .field("monitored", &self.inner.monitors.lock().len())
            .field("sorted", &self.inner.compare.read().is_some())
            .finish()
    }
}

/// A non-owning, read-only handle to a [`ProjectionEngine`].
///
/// Once the engine is dropped every read reports an empty projection.
pub struct ProjectionReader<T> {
    inner: Weak<EngineInner<T>>,
}

impl<T> Clone for ProjectionReader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> ProjectionReader<T> {
    /// Returns `true` while the engine is alive.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// A copy of the projected payloads, or `None` if the engine is gone.
    pub fn snapshot(&self) -> Option<Vec<Arc<T>>> {
        self.inner
            .upgrade()
            .map(|inner| inner.projected.read().to_vec())
    }

    pub fn contains(&self, payload: &Arc<T>) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.projected.read().contains(payload))
    }

    pub fn len(&self) -> usize {
        self.inner
            .upgrade()
            .map_or(0, |inner| inner.projected.read().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disconnects `connection` from the engine's change signal, if the
    /// engine is still alive.
    pub(crate) fn disconnect(&self, connection: ConnectionId) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.changed.disconnect(connection))
    }
}

/// Builder for [`ProjectionEngine`].
pub struct ProjectionBuilder<T> {
    source: Weak<SourceSequence<T>>,
    filter: Option<FilterFn<T>>,
    compare: Option<CompareFn<T>>,
}

impl<T: Send + Sync + 'static> ProjectionBuilder<T> {
    /// Creates a new builder for a projection of `source`.
    pub fn new(source: &Arc<SourceSequence<T>>) -> Self {
        Self {
            source: Arc::downgrade(source),
            filter: None,
            compare: None,
        }
    }

    /// Sets the filter predicate.
    pub fn filter<F>(self, filter: F) -> Self
    where
        F: Fn(&TaggedItem<T>) -> bool + Send + Sync + 'static,
    {
        self.filter_fn(Arc::new(filter))
    }

    /// Sets the filter predicate from a shared function.
    pub fn filter_fn(mut self, filter: FilterFn<T>) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the comparator.
    pub fn sort<F>(self, compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        self.sort_fn(Arc::new(compare))
    }

    /// Sets the comparator from a shared function.
    pub fn sort_fn(mut self, compare: CompareFn<T>) -> Self {
        self.compare = Some(compare);
        self
    }

    /// Builds the projection and performs the initial synchronization.
    ///
    /// Fails with [`Error::MissingFilter`] if no predicate was supplied and
    /// with [`Error::SourceDropped`] if the source no longer exists.
    pub fn build(self) -> Result<ProjectionEngine<T>> {
        let filter = self.filter.ok_or(Error::MissingFilter)?;
        let source = self.source.upgrade().ok_or(Error::SourceDropped)?;
        Ok(ProjectionEngine::attach(&source, filter, self.compare))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};

    use crate::mirror::ProjectionMirror;

    type Item = TaggedItem<&'static str>;

    fn item(name: &'static str, active: bool) -> Arc<Item> {
        let item = TaggedItem::new(name);
        item.set_active(active);
        Arc::new(item)
    }

    fn source_of(items: &[&Arc<Item>]) -> Arc<SourceSequence<&'static str>> {
        let items = items.iter().map(|item| Arc::clone(item)).collect();
        Arc::new(SourceSequence::with_items(items).unwrap())
    }

    fn active_projection(source: &Arc<SourceSequence<&'static str>>) -> ProjectionEngine<&'static str> {
        ProjectionEngine::new(source, |item| item.is_active())
    }

    fn record(engine: &ProjectionEngine<&'static str>) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        engine.changed().connect(move |change| {
            let entry = match change {
                ProjectionChange::Add { item, index } => format!("+{item}@{index}"),
                ProjectionChange::Remove { item, index } => format!("-{item}@{index}"),
                ProjectionChange::Reset => "reset".to_string(),
            };
            log_clone.lock().push(entry);
        });
        log
    }

    fn names(engine: &ProjectionEngine<&'static str>) -> Vec<&'static str> {
        engine.snapshot().iter().map(|payload| **payload).collect()
    }

    fn descending(a: &&'static str, b: &&'static str) -> std::cmp::Ordering {
        b.cmp(a)
    }

    #[test]
    fn test_initial_projection_keeps_source_order() {
        let (a, b, c) = (item("a", true), item("b", false), item("c", true));
        let source = source_of(&[&a, &b, &c]);
        let engine = active_projection(&source);

        assert_eq!(names(&engine), vec!["a", "c"]);
        assert_eq!(engine.monitored_count(), 3);
        assert_eq!(engine.included(&b), Some(false));
        assert!(engine.contains(a.payload()));
        assert!(!engine.contains(b.payload()));
    }

    #[test]
    fn test_item_becoming_included_emits_add() {
        let (a, b, c) = (item("a", true), item("b", false), item("c", true));
        let source = source_of(&[&a, &b, &c]);
        let engine = active_projection(&source);
        let log = record(&engine);

        b.set_active(true);

        assert_eq!(*log.lock(), vec!["+b@1"]);
        assert_eq!(names(&engine), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_item_becoming_excluded_emits_remove_at_old_index() {
        let (a, b, c) = (item("a", true), item("b", false), item("c", true));
        let source = source_of(&[&a, &b, &c]);
        let engine = active_projection(&source);
        let log = record(&engine);

        c.set_active(false);
        a.set_active(false);

        assert_eq!(*log.lock(), vec!["-c@1", "-a@0"]);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_unchanged_classification_emits_nothing() {
        let (a, b) = (item("a", true), item("b", false));
        let source = source_of(&[&a, &b]);
        let engine = active_projection(&source);
        let log = record(&engine);

        a.notify_classification_changed();
        b.notify_classification_changed();
        engine.on_classification_changed(&a);

        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_classification_change_under_comparator_reports_sorted_index() {
        let (a, b, c) = (item("a", true), item("b", false), item("c", true));
        let source = source_of(&[&a, &b, &c]);
        let engine = ProjectionEngine::builder(&source)
            .filter(|item| item.is_active())
            .sort(descending)
            .build()
            .unwrap();
        assert_eq!(names(&engine), vec!["c", "a"]);
        let log = record(&engine);

        b.set_active(true);
        assert_eq!(*log.lock(), vec!["+b@1"]);
        assert_eq!(names(&engine), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_set_comparator_emits_single_reset() {
        let (a, b, c) = (item("a", true), item("b", false), item("c", true));
        let source = source_of(&[&a, &b, &c]);
        let engine = active_projection(&source);
        let log = record(&engine);

        engine.set_sort(descending);

        assert_eq!(*log.lock(), vec!["reset"]);
        assert_eq!(names(&engine), vec!["c", "a"]);
        assert!(engine.has_comparator());
    }

    #[test]
    fn test_same_comparator_still_resets() {
        let source = source_of(&[&item("a", true)]);
        let engine = active_projection(&source);
        let compare: CompareFn<&'static str> = Arc::new(descending);
        engine.set_comparator(compare.clone());
        let log = record(&engine);

        engine.set_comparator(compare.clone());

        assert_eq!(*log.lock(), vec!["reset"]);
        assert!(engine.comparator().is_some_and(|current| Arc::ptr_eq(&current, &compare)));
    }

    #[test]
    fn test_clear_comparator_restores_source_order() {
        let (a, b) = (item("a", true), item("b", true));
        let source = source_of(&[&a, &b]);
        let engine = ProjectionEngine::builder(&source)
            .filter(|item| item.is_active())
            .sort(descending)
            .build()
            .unwrap();
        let log = record(&engine);

        engine.clear_comparator();

        assert_eq!(*log.lock(), vec!["reset"]);
        assert_eq!(names(&engine), vec!["a", "b"]);
        assert!(!engine.has_comparator());
    }

    #[test]
    fn test_comparator_ties_keep_source_order() {
        let items: Vec<_> = ["bb", "a", "cc", "d"].iter().map(|name| item(name, true)).collect();
        let source = source_of(&items.iter().collect::<Vec<_>>());
        let engine = active_projection(&source);

        engine.set_sort(|a, b| a.len().cmp(&b.len()));

        assert_eq!(names(&engine), vec!["a", "d", "bb", "cc"]);
    }

    #[test]
    fn test_append_without_comparator_emits_adds_in_ascending_order() {
        let a = item("a", true);
        let source = source_of(&[&a]);
        let engine = active_projection(&source);
        let log = record(&engine);

        source
            .extend(vec![item("x", true), item("y", false), item("z", true)])
            .unwrap();

        assert_eq!(*log.lock(), vec!["+x@1", "+z@2"]);
        assert_eq!(names(&engine), vec!["a", "x", "z"]);
        assert_eq!(engine.monitored_count(), 4);
    }

    #[test]
    fn test_insert_reports_position_in_source_order() {
        let (a, c) = (item("a", true), item("c", true));
        let source = source_of(&[&a, &c]);
        let engine = active_projection(&source);
        let log = record(&engine);

        source.insert(1, item("b", true)).unwrap();
        source.insert(0, item("hidden", false)).unwrap();

        assert_eq!(*log.lock(), vec!["+b@1"]);
        assert_eq!(names(&engine), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_append_with_comparator_emits_reset_only() {
        let (a, c) = (item("a", true), item("c", true));
        let source = source_of(&[&a, &c]);
        let engine = ProjectionEngine::builder(&source)
            .filter(|item| item.is_active())
            .sort(descending)
            .build()
            .unwrap();
        let log = record(&engine);

        source.push(item("d", true)).unwrap();

        assert_eq!(*log.lock(), vec!["reset"]);
        assert_eq!(names(&engine), vec!["d", "c", "a"]);
    }

    #[test]
    fn test_remove_emits_remove_even_with_comparator() {
        let (a, b, c) = (item("a", true), item("b", true), item("c", true));
        let source = source_of(&[&a, &b, &c]);
        let engine = ProjectionEngine::builder(&source)
            .filter(|item| item.is_active())
            .sort(descending)
            .build()
            .unwrap();
        let log = record(&engine);

        assert!(source.remove(&b));

        assert_eq!(*log.lock(), vec!["-b@1"]);
        assert_eq!(names(&engine), vec!["c", "a"]);
        assert!(!engine.is_monitored(&b));
    }

    #[test]
    fn test_removing_excluded_item_emits_nothing() {
        let (a, b) = (item("a", true), item("b", false));
        let source = source_of(&[&a, &b]);
        let engine = active_projection(&source);
        let log = record(&engine);

        assert!(source.remove(&b));

        assert!(log.lock().is_empty());
        assert_eq!(engine.monitored_count(), 1);
    }

    #[test]
    fn test_remove_many_reports_current_indices() {
        let items: Vec<_> = ["a", "b", "c", "d"].iter().map(|name| item(name, true)).collect();
        let source = source_of(&items.iter().collect::<Vec<_>>());
        let engine = active_projection(&source);
        let log = record(&engine);

        let removed = source.remove_many(&[items[1].clone(), items[3].clone()]);

        assert_eq!(removed, 2);
        assert_eq!(*log.lock(), vec!["-b@1", "-d@2"]);
        assert_eq!(names(&engine), vec!["a", "c"]);
    }

    #[test]
    fn test_removed_item_signals_are_ignored() {
        let (a, b) = (item("a", true), item("b", false));
        let source = source_of(&[&a, &b]);
        let engine = active_projection(&source);
        let log = record(&engine);

        source.remove(&b);
        assert_eq!(b.classification_changed().connection_count(), 0);

        b.set_active(true);
        engine.on_classification_changed(&b);

        assert!(log.lock().is_empty());
        assert_eq!(names(&engine), vec!["a"]);
    }

    #[test]
    fn test_other_change_rebuilds_and_resets() {
        let (a, b, c) = (item("a", true), item("b", false), item("c", true));
        let source = source_of(&[&a, &b, &c]);
        let engine = active_projection(&source);
        let log = record(&engine);

        let d = item("d", true);
        source.replace(2, d.clone()).unwrap();

        assert_eq!(*log.lock(), vec!["reset"]);
        assert_eq!(names(&engine), vec!["a", "d"]);
        assert!(!engine.is_monitored(&c));
        assert_eq!(c.classification_changed().connection_count(), 0);
        assert_eq!(a.classification_changed().connection_count(), 1);

        // The replaced item no longer drives the projection.
        c.set_active(false);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_clear_resets_to_empty() {
        let a = item("a", true);
        let source = source_of(&[&a]);
        let engine = active_projection(&source);
        let log = record(&engine);

        source.clear();

        assert_eq!(*log.lock(), vec!["reset"]);
        assert!(engine.is_empty());
        assert_eq!(engine.monitored_count(), 0);
    }

    #[test]
    fn test_drop_releases_every_subscription() {
        let (a, b) = (item("a", true), item("b", false));
        let source = source_of(&[&a, &b]);
        let engine = active_projection(&source);
        let reader = engine.reader();
        assert_eq!(source.changed().connection_count(), 1);
        assert_eq!(a.classification_changed().connection_count(), 1);

        drop(engine);

        assert_eq!(source.changed().connection_count(), 0);
        assert_eq!(a.classification_changed().connection_count(), 0);
        assert_eq!(b.classification_changed().connection_count(), 0);
        assert!(!reader.is_alive());
        assert!(reader.snapshot().is_none());
        assert!(reader.is_empty());
    }

    #[test]
    fn test_engine_survives_source_drop() {
        let a = item("a", true);
        let source = source_of(&[&a]);
        let engine = active_projection(&source);
        drop(source);

        engine.on_source_other();

        assert!(engine.is_empty());
        assert_eq!(engine.monitored_count(), 0);
        assert_eq!(a.classification_changed().connection_count(), 0);
    }

    #[test]
    fn test_observer_may_read_and_mutate_during_notification() {
        let (a, b) = (item("a", true), item("b", false));
        let source = source_of(&[&a, &b]);
        let engine = Arc::new(active_projection(&source));
        let seen_lengths = Arc::new(Mutex::new(Vec::new()));
        let pushed = Arc::new(AtomicUsize::new(0));

        let weak_engine = Arc::downgrade(&engine);
        let source_clone = source.clone();
        let seen_clone = seen_lengths.clone();
        let pushed_clone = pushed.clone();
        engine.changed().connect(move |_| {
            if let Some(engine) = weak_engine.upgrade() {
                seen_clone.lock().push(engine.len());
            }
            if pushed_clone.fetch_add(1, AtomicOrdering::SeqCst) == 0 {
                source_clone.push(item("late", true)).unwrap();
            }
        });

        b.set_active(true);

        assert_eq!(*seen_lengths.lock(), vec![2, 3]);
        assert_eq!(names(&engine), vec!["a", "b", "late"]);
    }

    #[test]
    fn test_predicate_runs_without_locks_held() {
        let a = item("a", true);
        let source = source_of(&[&a]);
        let evaluations = Arc::new(AtomicUsize::new(0));
        let evaluations_clone = evaluations.clone();
        let source_clone = source.clone();
        let engine = ProjectionEngine::new(&source, move |item: &Item| {
            evaluations_clone.fetch_add(1, AtomicOrdering::SeqCst);
            // Reads the source and the item's own state from inside the predicate.
            source_clone.contains(item) && item.is_active()
        });

        a.set_active(false);
        a.set_active(true);

        assert_eq!(evaluations.load(AtomicOrdering::SeqCst), 3);
        assert_eq!(names(&engine), vec!["a"]);
    }

    #[test]
    fn test_builder_requires_filter() {
        let source: Arc<SourceSequence<&'static str>> = Arc::new(SourceSequence::new());
        let result = ProjectionEngine::builder(&source).sort(descending).build();
        assert!(matches!(result, Err(Error::MissingFilter)));
    }

    #[test]
    fn test_builder_rejects_dropped_source() {
        let source: Arc<SourceSequence<&'static str>> = Arc::new(SourceSequence::new());
        let builder = ProjectionBuilder::new(&source).filter(|_| true);
        drop(source);
        assert!(matches!(builder.build(), Err(Error::SourceDropped)));
    }

    #[test]
    fn test_item_outside_source_is_monitored_but_not_projected() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let source: Arc<SourceSequence<&'static str>> = Arc::new(SourceSequence::new());
        let engine = active_projection(&source);
        let log = record(&engine);
        let stray = item("stray", true);

        // Not in the source, so the rebuild ignores it even though it is monitored.
        engine.on_source_added(&[stray.clone()]);

        assert!(log.lock().is_empty());
        assert!(engine.is_monitored(&stray));
        assert!(engine.is_empty());

        // Marked included but absent from the projection: no index to report.
        engine.on_source_removed(&[stray.clone()]);
        assert_eq!(*log.lock(), vec!["reset"]);
        assert!(!engine.is_monitored(&stray));
        assert_eq!(stray.classification_changed().connection_count(), 0);
    }

    #[test]
    fn test_reclassification_during_batch_is_announced_once() {
        let source: Arc<SourceSequence<&'static str>> = Arc::new(SourceSequence::new());
        let x = item("x", false);
        let y = item("y", true);
        let (x_clone, y_id) = (x.clone(), y.id());
        // Classifying y activates x, which is already monitored by then.
        let engine = ProjectionEngine::new(&source, move |item: &Item| {
            if item.id() == y_id {
                x_clone.set_active(true);
            }
            item.is_active()
        });
        let mirror = ProjectionMirror::attach(&engine);
        let log = record(&engine);

        source.extend(vec![x.clone(), y.clone()]).unwrap();

        assert_eq!(*log.lock(), vec!["+x@0", "+y@1"]);
        assert_eq!(names(&engine), vec!["x", "y"]);
        assert!(!mirror.has_diverged());
        assert!(mirror.matches_projection());
    }

    #[test]
    fn test_reclassification_behind_earlier_batch_item() {
        let a = item("a", true);
        let source = source_of(&[&a]);
        let p = item("p", true);
        let x = item("x", false);
        let y = item("y", true);
        let (x_clone, y_id) = (x.clone(), y.id());
        let engine = ProjectionEngine::new(&source, move |item: &Item| {
            if item.id() == y_id {
                x_clone.set_active(true);
            }
            item.is_active()
        });
        let mirror = ProjectionMirror::attach(&engine);
        let log = record(&engine);

        source.extend(vec![p.clone(), x.clone(), y.clone()]).unwrap();

        assert_eq!(*log.lock(), vec!["+p@1", "+x@2", "+y@3"]);
        assert!(!mirror.has_diverged());
        assert!(mirror.matches_projection());
    }

    #[test]
    fn test_batch_that_hides_a_shown_item_resets() {
        let a = item("a", true);
        let b = item("b", true);
        let source = source_of(&[&a, &b]);
        let c = item("c", true);
        let (a_clone, c_id) = (a.clone(), c.id());
        let engine = ProjectionEngine::new(&source, move |item: &Item| {
            if item.id() == c_id {
                a_clone.set_active(false);
            }
            item.is_active()
        });
        let mirror = ProjectionMirror::attach(&engine);
        let log = record(&engine);

        source.push(c.clone()).unwrap();

        assert_eq!(*log.lock(), vec!["reset"]);
        assert_eq!(names(&engine), vec!["b", "c"]);
        assert!(mirror.matches_projection());
    }

    #[test]
    fn test_reclassification_during_rebuild_ends_in_reset() {
        let x = item("x", false);
        let y = item("y", true);
        let source = source_of(&[&x, &y]);
        let armed = Arc::new(AtomicBool::new(false));
        let (x_clone, y_id, armed_clone) = (x.clone(), y.id(), armed.clone());
        let engine = ProjectionEngine::new(&source, move |item: &Item| {
            if item.id() == y_id && armed_clone.load(AtomicOrdering::SeqCst) {
                x_clone.set_active(true);
            }
            item.is_active()
        });
        assert_eq!(names(&engine), vec!["y"]);
        let mirror = ProjectionMirror::attach(&engine);
        let log = record(&engine);

        armed.store(true, AtomicOrdering::SeqCst);
        source.reset(vec![x.clone(), y.clone()]).unwrap();

        assert_eq!(*log.lock(), vec!["reset"]);
        assert_eq!(names(&engine), vec!["x", "y"]);
        assert!(!engine.changed().is_blocked());
        assert!(!mirror.has_diverged());
        assert!(mirror.matches_projection());
        assert_eq!(mirror.resets(), 1);
    }

    #[test]
    fn test_rebuild_respects_caller_blocking() {
        let a = item("a", true);
        let source = source_of(&[&a]);
        let engine = active_projection(&source);
        let log = record(&engine);

        engine.changed().set_blocked(true);
        source.clear();

        assert!(engine.changed().is_blocked());
        assert!(log.lock().is_empty());
        assert!(engine.is_empty());
    }
}
