//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MonitorService / controllers (domain)
//! ```
//!
//! Driven adapters (probes, the telemetry transport, the daily journal,
//! the clock) implement these traits. The monitor core consumes them via
//! generics, so it never touches hardware, sockets or files directly and
//! runs unchanged against the mocks in `tests/integration/mock_hw.rs`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::config::SystemConfig;
use crate::error::Result;

use super::events::MonitorEvent;
use super::reading::{Reading, Value};

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapters: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Motion/smoke collaborator.
///
/// A sample carries `motion_detected` and `smoke_detected` flags and, when
/// a camera captured something, an `image_path`.
pub trait SecurityPort {
    fn sample(&mut self, at: DateTime<Local>) -> Result<Reading>;
}

/// Temperature/humidity collaborator.
///
/// Retries are the collaborator's business: after its bounded attempts
/// it returns whatever it has, with unread fields simply absent.
pub trait EnvironmentPort {
    fn sample(&mut self, at: DateTime<Local>) -> Reading;
}

// ───────────────────────────────────────────────────────────────
// Telemetry port (driven adapter: domain → remote channel)
// ───────────────────────────────────────────────────────────────

/// Best-effort delivery of one named field.
///
/// No retry, no queue: `false` means the value is dropped for this cycle.
pub trait CloudPublisher {
    fn publish(&mut self, feed: &str, value: &Value) -> bool;
}

impl<T: CloudPublisher + ?Sized> CloudPublisher for Box<T> {
    fn publish(&mut self, feed: &str, value: &Value) -> bool {
        (**self).publish(feed, value)
    }
}

// ───────────────────────────────────────────────────────────────
// Journal port (driven adapter: domain → local storage)
// ───────────────────────────────────────────────────────────────

/// Named log streams, one file per stream per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Environmental,
    Security,
    DeviceStatus,
}

impl Stream {
    pub const ALL: [Stream; 3] = [Self::Environmental, Self::Security, Self::DeviceStatus];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Environmental => "environmental_data",
            Self::Security => "security_data",
            Self::DeviceStatus => "device_status",
        }
    }
}

/// Append-only record store. Shared between the monitor thread and the
/// shutdown path, so implementations synchronise internally.
pub trait JournalPort: Send + Sync {
    /// Append one record as a single line.
    fn append(&self, stream: Stream, record: &Reading) -> Result<()>;

    /// Flush and sync every open stream. Failures are logged, never
    /// raised; returns how many streams failed.
    fn sync_all(&self) -> usize;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

pub trait EventSink {
    fn emit(&mut self, event: &MonitorEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Two clocks: a monotonic one for interval timers (never goes back),
/// and the wall clock for record timestamps and log file names.
pub trait Clock {
    fn monotonic(&self) -> Duration;
    fn wall(&self) -> DateTime<Local>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads system configuration.
///
/// Implementations validate before returning; a missing source is not an
/// error and yields [`SystemConfig::default()`].
pub trait ConfigPort {
    fn load(&self) -> core::result::Result<SystemConfig, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Command bus (driving adapter: transport → controllers)
// ───────────────────────────────────────────────────────────────

/// Callback invoked with the raw payload of one inbound message. Runs on
/// whichever thread the transport delivers on.
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Topic-addressed delivery of inbound command messages.
pub trait CommandBus: Send + Sync {
    fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<()>;
    fn unsubscribe(&self, topic: &str);
}

// ───────────────────────────────────────────────────────────────
// Controller-facing ports used by the monitor
// ───────────────────────────────────────────────────────────────

/// Local audible alarm, sounded on every detection.
pub trait AlarmPort: Send + Sync {
    fn sound_alarm(&self);
}

/// A device family that can report its current state for the
/// `device_status` log.
pub trait StatusSource: Send + Sync {
    fn label(&self) -> &str;
    fn status(&self) -> Vec<(String, Value)>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found (first boot).
    NotFound,
    /// The file exists but is not a valid JSON config object.
    Corrupted(String),
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// The file exists but could not be read.
    IoError(std::io::ErrorKind),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted(msg) => write!(f, "config corrupted: {}", msg),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError(kind) => write!(f, "I/O error: {}", kind),
        }
    }
}

impl std::error::Error for ConfigError {}
