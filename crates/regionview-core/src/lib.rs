//! Core primitives for regionview.
//!
//! This crate provides the building blocks the projection engine is wired
//! from:
//!
//! - **Signal/Slot System**: Type-safe, synchronous, reentrant notification
//! - **Property System**: Value cells that report whether a write changed them
//! - **Logging**: `tracing` targets and performance spans
//!
//! # Signal/Slot Example
//!
//! ```
//! use regionview_core::Signal;
//!
//! // Create a signal that notifies when a value changes
//! let value_changed = Signal::<i32>::new();
//!
//! // Connect a slot to handle the signal
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! // Emit the signal
//! value_changed.emit(42);
//!
//! // Disconnect when done
//! value_changed.disconnect(conn_id);
//! ```
//!
//! # Property Example
//!
//! ```
//! use regionview_core::{Property, Signal};
//!
//! // An activation flag with change notification
//! struct Toggle {
//!     on: Property<bool>,
//!     toggled: Signal<bool>,
//! }
//!
//! impl Toggle {
//!     fn flip(&self) {
//!         let next = !self.on.get();
//!         if self.on.set(next) {
//!             self.toggled.emit(next);
//!         }
//!     }
//! }
//! ```

pub mod logging;
pub mod property;
pub mod signal;

pub use logging::PerfSpan;
pub use property::Property;
pub use signal::{ConnectionId, Signal};
