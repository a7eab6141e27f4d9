//! Outbound monitor events.
//!
//! The [`MonitorService`](super::service::MonitorService) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on
//! the other side decide what to do with them (console log, test recorder).

use super::reading::Reading;

/// Structured events emitted by the monitor core.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// The monitor loop has started.
    Started,

    /// A security sample reported at least one detection.
    Detection {
        motion: bool,
        smoke: bool,
        /// Running totals since the last summary.
        motion_total: u32,
        smoke_total: u32,
    },

    /// A security summary boundary was crossed; counters are now zero.
    SummarySent(SummaryReport),

    /// An environmental reading was logged.
    Environment { reading: Reading, published: bool },

    /// The daily logs were flushed and synced.
    LogsSynced { failures: usize },

    /// One monitor iteration failed; the loop backs off and continues.
    CycleFailed { reason: String },

    /// The monitor loop has exited.
    Stopped,
}

/// What went out at one summary boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryReport {
    pub motion_count: u32,
    pub smoke_count: u32,
    /// `true` only if every attempted field was delivered.
    pub published: bool,
}
