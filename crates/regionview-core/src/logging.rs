//! Logging facilities for regionview.
//!
//! regionview uses the `tracing` crate for instrumentation and never installs
//! a subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("regionview=debug,regionview_core=info")
//!         .init();
//!
//!     // Your application code...
//! }
//! ```
//!
//! Filter on the names in [`targets`] to narrow output to one subsystem.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core primitives target.
    pub const CORE: &str = "regionview_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "regionview_core::signal";
    /// Source sequence mutations.
    pub const SOURCE: &str = "regionview::source";
    /// Projection engine transitions and rebuilds.
    pub const PROJECTION: &str = "regionview::projection";
    /// Downstream mirrors.
    pub const MIRROR: &str = "regionview::mirror";
    /// Performance spans.
    pub const PERF: &str = "regionview::perf";
}

/// A guard that keeps a tracing span entered until dropped.
///
/// This is useful for tracking the duration of operations.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    ///
    /// The span will be active until the guard is dropped.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "regionview::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
