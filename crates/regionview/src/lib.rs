//! regionview - live filtered and sorted projections over observable item
//! sequences.
//!
//! A [`SourceSequence`] holds [`TaggedItem`]s: opaque payloads plus the
//! classification state (active flag, name) that filters read. A
//! [`ProjectionEngine`] keeps a [`ProjectedSequence`] equal to
//! `sort(filter(source))` as items are added, removed, and reclassified, and
//! reports each change as a positional [`ProjectionChange`] whenever it can,
//! falling back to `Reset` otherwise.
//!
//! The reactive primitives ([`Signal`], [`Property`]) come from
//! `regionview-core` and are re-exported here.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use regionview::{ProjectionEngine, ProjectionMirror, SourceSequence, TaggedItem, filters, ordering};
//!
//! let source = Arc::new(SourceSequence::new());
//! let views = ProjectionEngine::with_filter(&source, filters::all());
//! let active_views = ProjectionEngine::builder(&source)
//!     .filter_fn(filters::active())
//!     .sort_fn(ordering::natural())
//!     .build()
//!     .unwrap();
//! let shown = ProjectionMirror::attach(&active_views);
//!
//! let editor = Arc::new(TaggedItem::new("editor").with_name("main"));
//! let console = Arc::new(TaggedItem::new("console"));
//! source.extend(vec![editor.clone(), console.clone()]).unwrap();
//! assert_eq!(views.len(), 2);
//! assert!(active_views.is_empty());
//!
//! console.set_active(true);
//! editor.set_active(true);
//! let order: Vec<&str> = shown.items().iter().map(|v| **v).collect();
//! assert_eq!(order, vec!["console", "editor"]);
//! ```

mod change;
mod error;
mod item;
mod mirror;
mod monitor;
mod projection;
mod sequence;
mod source;

pub mod filters;
pub mod ordering;

pub use change::ProjectionChange;
pub use error::{Error, Result};
pub use item::{ItemId, TaggedItem};
pub use mirror::ProjectionMirror;
pub use projection::{CompareFn, FilterFn, ProjectionBuilder, ProjectionEngine, ProjectionReader};
pub use sequence::ProjectedSequence;
pub use source::{SourceChange, SourceSequence};

pub use regionview_core::{ConnectionId, Property, Signal};
