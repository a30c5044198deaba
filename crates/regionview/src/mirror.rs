//! A downstream copy of a projection kept current from its notifications.
//!
//! [`ProjectionMirror`] is what a presentation layer does with a projection:
//! it keeps its own list and applies each [`ProjectionChange`] to it,
//! positionally for `Add`/`Remove` and by re-reading the whole projection on
//! `Reset`. Because it never consults the projection except on `Reset`, a
//! mirror that stays equal to [`ProjectionEngine::snapshot`] shows that every
//! index the engine emitted was valid when it was delivered.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use regionview_core::ConnectionId;
use regionview_core::logging::targets;

use crate::change::ProjectionChange;
use crate::projection::{ProjectionEngine, ProjectionReader};

struct MirrorState<T> {
    items: Vec<Arc<T>>,
    resets: usize,
    /// Set once a positional change could not be applied.
    diverged: bool,
}

impl<T> MirrorState<T> {
    fn apply(&mut self, change: &ProjectionChange<T>, reader: &ProjectionReader<T>) {
        match change {
            ProjectionChange::Add { item, index } => {
                if *index > self.items.len() {
                    tracing::warn!(target: targets::MIRROR, index, len = self.items.len(), "add index out of range");
                    self.diverged = true;
                    return;
                }
                self.items.insert(*index, Arc::clone(item));
            }
            ProjectionChange::Remove { item, index } => {
                match self.items.get(*index) {
                    Some(current) if Arc::ptr_eq(current, item) => {
                        self.items.remove(*index);
                    }
                    _ => {
                        tracing::warn!(target: targets::MIRROR, index, len = self.items.len(), "remove does not match mirrored item");
                        self.diverged = true;
                    }
                }
            }
            ProjectionChange::Reset => {
                self.items = reader.snapshot().unwrap_or_default();
                self.resets += 1;
                tracing::trace!(target: targets::MIRROR, len = self.items.len(), "mirror reloaded");
            }
        }
    }
}

/// Keeps a private copy of a projection by replaying its notifications.
///
/// Dropping the mirror disconnects it from the engine. If the engine is
/// dropped first, the mirror keeps its last contents.
///
/// ```
/// use std::sync::Arc;
/// use regionview::{ProjectionEngine, ProjectionMirror, SourceSequence, TaggedItem, filters};
///
/// let source = Arc::new(SourceSequence::new());
/// let engine = ProjectionEngine::with_filter(&source, filters::all());
/// let mirror = ProjectionMirror::attach(&engine);
///
/// source.push(Arc::new(TaggedItem::new(1))).unwrap();
/// assert_eq!(mirror.len(), 1);
/// ```
pub struct ProjectionMirror<T> {
    state: Arc<Mutex<MirrorState<T>>>,
    reader: ProjectionReader<T>,
    connection: ConnectionId,
}

impl<T: Send + Sync + 'static> ProjectionMirror<T> {
    /// Copies the current projection and subscribes to its changes.
    pub fn attach(engine: &ProjectionEngine<T>) -> Self {
        let reader = engine.reader();
        let state = Arc::new(Mutex::new(MirrorState {
            items: engine.snapshot(),
            resets: 0,
            diverged: false,
        }));

        let state_clone = state.clone();
        let reader_clone = reader.clone();
        let connection = engine.changed().connect(move |change| {
            state_clone.lock().apply(change, &reader_clone);
        });

        tracing::trace!(target: targets::MIRROR, len = state.lock().items.len(), "mirror attached");
        Self {
            state,
            reader,
            connection,
        }
    }
}

impl<T> ProjectionMirror<T> {
    /// A copy of the mirrored items.
    pub fn items(&self) -> Vec<Arc<T>> {
        self.state.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Number of `Reset` notifications applied so far.
    pub fn resets(&self) -> usize {
        self.state.lock().resets
    }

    /// Returns `true` if a positional change ever failed to apply.
    pub fn has_diverged(&self) -> bool {
        self.state.lock().diverged
    }

    /// Returns `true` if the mirrored items are, by identity and in order,
    /// the current contents of the projection.
    pub fn matches_projection(&self) -> bool {
        let projected = self.reader.snapshot().unwrap_or_default();
        let state = self.state.lock();
        state.items.len() == projected.len()
            && state
                .items
                .iter()
                .zip(&projected)
                .all(|(mirrored, current)| Arc::ptr_eq(mirrored, current))
    }
}

impl<T> Drop for ProjectionMirror<T> {
    fn drop(&mut self) {
        self.reader.disconnect(self.connection);
    }
}

impl<T: fmt::Debug> fmt::Debug for ProjectionMirror<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProjectionMirror")
            .field("items", &state.items)
            .field("resets", &state.resets)
            .field("diverged", &state.diverged)
            .finish()
    }
}
