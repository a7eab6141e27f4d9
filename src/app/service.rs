//! Monitor service: the multi-rate sampling and aggregation core.
//!
//! [`MonitorService`] owns the interval timers and the security counters.
//! All I/O flows through port traits injected at call sites (bundled in
//! [`Collaborators`]), so the whole loop body runs against mocks and a
//! hand-stepped clock.
//!
//! ```text
//!  SecurityPort ────▶ ┌──────────────────────────┐ ──▶ CloudPublisher
//!  EnvironmentPort ─▶ │      MonitorService      │ ──▶ JournalPort
//!         Clock ────▶ │  Scheduler · Counters    │ ──▶ EventSink
//!                     └──────────────────────────┘ ──▶ AlarmPort
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use log::{debug, info, warn};

use crate::config::{Intervals, SystemConfig};
use crate::error::Result;
use crate::scheduler::{Scheduler, TimerId};

use super::events::{MonitorEvent, SummaryReport};
use super::ports::{
    AlarmPort, Clock, CloudPublisher, EnvironmentPort, EventSink, JournalPort, SecurityPort,
    StatusSource, Stream,
};
use super::reading::Reading;

pub const MOTION_FIELD: &str = "motion_detected";
pub const SMOKE_FIELD: &str = "smoke_detected";
pub const MOTION_COUNT_FIELD: &str = "motion_count";
pub const SMOKE_COUNT_FIELD: &str = "smoke_count";

// ───────────────────────────────────────────────────────────────
// Counters
// ───────────────────────────────────────────────────────────────

/// Detections since the last summary boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecurityCounters {
    pub motion: u32,
    pub smoke: u32,
}

impl SecurityCounters {
    /// Count the flags of one sample. Returns `(motion, smoke)`.
    fn record(&mut self, sample: &Reading) -> (bool, bool) {
        let motion = sample.flag(MOTION_FIELD);
        let smoke = sample.flag(SMOKE_FIELD);
        if motion {
            self.motion = self.motion.saturating_add(1);
        }
        if smoke {
            self.smoke = self.smoke.saturating_add(1);
        }
        (motion, smoke)
    }

    /// Hand out the totals and zero both counters together.
    fn take(&mut self) -> Self {
        core::mem::take(self)
    }
}

// ───────────────────────────────────────────────────────────────
// Collaborators
// ───────────────────────────────────────────────────────────────

/// Everything the loop body talks to, handed in on every [`tick`].
///
/// [`tick`]: MonitorService::tick
pub struct Collaborators<S, E, C> {
    pub security: S,
    pub environment: E,
    pub cloud: C,
    pub journal: Arc<dyn JournalPort>,
    /// Sounded on every detection.
    pub alarm: Option<Arc<dyn AlarmPort>>,
    /// Snapshotted into `device_status` at each summary boundary.
    pub devices: Vec<Arc<dyn StatusSource>>,
}

impl<S, E, C> Collaborators<S, E, C> {
    pub fn new(security: S, environment: E, cloud: C, journal: Arc<dyn JournalPort>) -> Self {
        Self {
            security,
            environment,
            cloud,
            journal,
            alarm: None,
            devices: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_alarm(mut self, alarm: Arc<dyn AlarmPort>) -> Self {
        self.alarm = Some(alarm);
        self
    }

    #[must_use]
    pub fn with_device(mut self, device: Arc<dyn StatusSource>) -> Self {
        self.devices.push(device);
        self
    }
}

// ───────────────────────────────────────────────────────────────
// MonitorService
// ───────────────────────────────────────────────────────────────

pub struct MonitorService {
    scheduler: Scheduler,
    counters: SecurityCounters,
    intervals: Intervals,
    env_feeds: BTreeMap<String, String>,
    security_feeds: BTreeMap<String, String>,
}

impl MonitorService {
    /// `now` is the monotonic instant the summary window opens at.
    pub fn new(config: &SystemConfig, now: core::time::Duration) -> Self {
        let intervals = config.intervals();
        Self {
            scheduler: Scheduler::new(&intervals, now),
            counters: SecurityCounters::default(),
            intervals,
            env_feeds: config.env_feeds.clone(),
            security_feeds: config.security_feeds.clone(),
        }
    }

    pub fn counters(&self) -> SecurityCounters {
        self.counters
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn intervals(&self) -> &Intervals {
        &self.intervals
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// Run every due step once, in fixed order.
    ///
    /// The first failing step aborts the iteration; its timer stays where
    /// it was so the step is retried next time round.
    pub fn tick<S, E, C>(
        &mut self,
        clock: &impl Clock,
        io: &mut Collaborators<S, E, C>,
        sink: &mut impl EventSink,
    ) -> Result<()>
    where
        S: SecurityPort,
        E: EnvironmentPort,
        C: CloudPublisher,
    {
        let now = clock.monotonic();
        for id in self.scheduler.due(now) {
            match id {
                TimerId::SecurityCheck => self.check_security(now, clock.wall(), io, sink)?,
                TimerId::SecuritySend => self.send_summary(now, clock.wall(), io, sink),
                TimerId::EnvCheck => self.check_environment(now, clock.wall(), io, sink)?,
                TimerId::LogSync => {
                    let failures = io.journal.sync_all();
                    self.scheduler.mark_fired(TimerId::LogSync, now);
                    sink.emit(&MonitorEvent::LogsSynced { failures });
                }
            }
        }
        Ok(())
    }

    // ── Steps ─────────────────────────────────────────────────

    fn check_security<S, E, C>(
        &mut self,
        now: core::time::Duration,
        at: DateTime<Local>,
        io: &mut Collaborators<S, E, C>,
        sink: &mut impl EventSink,
    ) -> Result<()>
    where
        S: SecurityPort,
    {
        let sample = io.security.sample(at)?;
        let (motion, smoke) = self.counters.record(&sample);
        // Counted: from here on a retry would double-count.
        self.scheduler.mark_fired(TimerId::SecurityCheck, now);

        if !(motion || smoke) {
            return Ok(());
        }
        info!(
            "Monitor: detection motion={} smoke={} (totals {}/{})",
            motion, smoke, self.counters.motion, self.counters.smoke
        );
        if let Some(alarm) = &io.alarm {
            alarm.sound_alarm();
        }
        sink.emit(&MonitorEvent::Detection {
            motion,
            smoke,
            motion_total: self.counters.motion,
            smoke_total: self.counters.smoke,
        });
        io.journal.append(Stream::Security, &sample)
    }

    fn send_summary<S, E, C>(
        &mut self,
        now: core::time::Duration,
        at: DateTime<Local>,
        io: &mut Collaborators<S, E, C>,
        sink: &mut impl EventSink,
    ) where
        C: CloudPublisher,
    {
        let summary = Reading::new(at)
            .with(MOTION_COUNT_FIELD, self.counters.motion)
            .with(SMOKE_COUNT_FIELD, self.counters.smoke);
        let published = publish_mapped(&mut io.cloud, &summary, &self.security_feeds);
        let totals = self.counters.take();
        self.scheduler.mark_fired(TimerId::SecuritySend, now);

        if published {
            info!(
                "Monitor: summary sent (motion={}, smoke={})",
                totals.motion, totals.smoke
            );
        } else {
            warn!(
                "Monitor: summary not fully delivered (motion={}, smoke={})",
                totals.motion, totals.smoke
            );
        }
        sink.emit(&MonitorEvent::SummarySent(SummaryReport {
            motion_count: totals.motion,
            smoke_count: totals.smoke,
            published,
        }));

        if !io.devices.is_empty() {
            let snapshot = device_snapshot(at, &io.devices);
            if let Err(e) = io.journal.append(Stream::DeviceStatus, &snapshot) {
                warn!("Monitor: device status not logged: {}", e);
            }
        }
    }

    fn check_environment<S, E, C>(
        &mut self,
        now: core::time::Duration,
        at: DateTime<Local>,
        io: &mut Collaborators<S, E, C>,
        sink: &mut impl EventSink,
    ) -> Result<()>
    where
        E: EnvironmentPort,
        C: CloudPublisher,
    {
        let reading = io.environment.sample(at);
        io.journal.append(Stream::Environmental, &reading)?;
        let published = publish_mapped(&mut io.cloud, &reading, &self.env_feeds);
        self.scheduler.mark_fired(TimerId::EnvCheck, now);

        debug!(
            "Monitor: environment {} field(s), published={}",
            reading.fields().len(),
            published
        );
        sink.emit(&MonitorEvent::Environment { reading, published });
        Ok(())
    }
}

/// Publish every mapped field present in `reading`, one attempt each.
///
/// Keeps going after a failure; `true` only if every attempt succeeded.
/// Absent fields are skipped, not published as zero.
pub fn publish_mapped(
    cloud: &mut impl CloudPublisher,
    reading: &Reading,
    feeds: &BTreeMap<String, String>,
) -> bool {
    let mut all_ok = true;
    for (field, feed) in feeds {
        let Some(value) = reading.get(field) else {
            continue;
        };
        if !cloud.publish(feed, value) {
            warn!("Monitor: publish of {} to '{}' failed", field, feed);
            all_ok = false;
        }
    }
    all_ok
}

/// `<label>.<name>` for every output of every device.
fn device_snapshot(at: DateTime<Local>, devices: &[Arc<dyn StatusSource>]) -> Reading {
    devices.iter().fold(Reading::new(at), |reading, device| {
        device
            .status()
            .into_iter()
            .fold(reading, |r, (name, value)| {
                r.with(&format!("{}.{}", device.label(), name), value)
            })
    })
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
