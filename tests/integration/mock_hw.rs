//! Mock hardware and collaborators for integration tests.
//!
//! Every mock keeps its record behind an `Arc` so a test can hand the
//! mock to the code under test and still inspect what happened.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use embedded_hal::digital::{self, ErrorKind, OutputPin};

use domisafe::app::events::MonitorEvent;
use domisafe::app::ports::{
    AlarmPort, Clock, CloudPublisher, EnvironmentPort, EventSink, JournalPort, SecurityPort, Stream,
};
use domisafe::app::reading::{Reading, Value};
use domisafe::app::service::{MOTION_FIELD, SMOKE_FIELD};
use domisafe::config::{Credentials, SystemConfig};
use domisafe::drivers::display::TextDisplay;
use domisafe::error::{Error, Result, SensorError};

pub fn credentials() -> Credentials {
    Credentials {
        username: "alice".into(),
        key: "aio_test_key".into(),
    }
}

pub fn config() -> SystemConfig {
    SystemConfig {
        username: "alice".into(),
        key: "aio_test_key".into(),
        ..SystemConfig::default()
    }
}

/// Poll `cond` every 5 ms until it holds or `within` passes.
pub fn eventually(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + within;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

// ── Pins ──────────────────────────────────────────────────────

/// Output pin that records every level written to it.
#[derive(Clone, Default)]
pub struct RecordingPin {
    pub writes: Arc<Mutex<Vec<bool>>>,
}

#[allow(dead_code)]
impl RecordingPin {
    pub fn level(&self) -> bool {
        self.writes.lock().unwrap().last().copied().unwrap_or(false)
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }
}

impl digital::ErrorType for RecordingPin {
    type Error = Infallible;
}

impl OutputPin for RecordingPin {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        self.writes.lock().unwrap().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        self.writes.lock().unwrap().push(true);
        Ok(())
    }
}

/// Output pin that accepts LOW but refuses to go HIGH.
pub struct StuckLowPin;

impl digital::ErrorType for StuckLowPin {
    type Error = ErrorKind;
}

impl OutputPin for StuckLowPin {
    fn set_low(&mut self) -> core::result::Result<(), ErrorKind> {
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), ErrorKind> {
        Err(ErrorKind::Other)
    }
}

// ── Display ───────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MockDisplay {
    pub frames: Arc<Mutex<Vec<Vec<String>>>>,
    pub backlight: Arc<Mutex<Option<bool>>>,
}

#[allow(dead_code)]
impl MockDisplay {
    pub fn last_frame(&self) -> Option<Vec<String>> {
        self.frames.lock().unwrap().last().cloned()
    }
}

impl TextDisplay for MockDisplay {
    fn show(&mut self, lines: &[String]) -> Result<()> {
        self.frames.lock().unwrap().push(lines.to_vec());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.frames.lock().unwrap().push(Vec::new());
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<()> {
        *self.backlight.lock().unwrap() = Some(on);
        Ok(())
    }
}

// ── Clock ─────────────────────────────────────────────────────

/// Simulated time: wall clock = fixed base + monotonic offset.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn set_secs(&self, secs: u64) {
        *self.now.lock().unwrap() = Duration::from_secs(secs);
    }

    pub fn base() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }
}

impl Clock for ManualClock {
    fn monotonic(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    fn wall(&self) -> DateTime<Local> {
        let offset = chrono::Duration::from_std(self.monotonic()).unwrap();
        Self::base() + offset
    }
}

// ── Sensors ───────────────────────────────────────────────────

/// Motion events at fixed instants (seconds after [`ManualClock::base`]).
/// A sample reports motion if an event fell since the previous sample.
pub struct ScriptedSecurity {
    motion_at: Vec<i64>,
    last_sample: Option<i64>,
    pub samples: Arc<AtomicUsize>,
}

impl ScriptedSecurity {
    pub fn new(motion_at: &[i64]) -> Self {
        Self {
            motion_at: motion_at.to_vec(),
            last_sample: None,
            samples: Arc::default(),
        }
    }
}

impl SecurityPort for ScriptedSecurity {
    fn sample(&mut self, at: DateTime<Local>) -> Result<Reading> {
        let t = (at - ManualClock::base()).num_seconds();
        let since = self.last_sample.unwrap_or(i64::MIN);
        let motion = self.motion_at.iter().any(|&m| m > since && m <= t);
        self.last_sample = Some(t);
        self.samples.fetch_add(1, Ordering::SeqCst);
        Ok(Reading::new(at)
            .with(MOTION_FIELD, motion)
            .with(SMOKE_FIELD, false))
    }
}

/// Runs a queue of scripted outcomes, then reports quiet samples.
pub enum Step {
    Quiet,
    Motion,
    Fail,
    Panic,
}

pub struct StepSecurity {
    steps: VecDeque<Step>,
}

impl StepSecurity {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }

    pub fn quiet() -> Self {
        Self {
            steps: VecDeque::new(),
        }
    }
}

impl SecurityPort for StepSecurity {
    fn sample(&mut self, at: DateTime<Local>) -> Result<Reading> {
        let motion = match self.steps.pop_front().unwrap_or(Step::Quiet) {
            Step::Quiet => false,
            Step::Motion => true,
            Step::Fail => return Err(Error::Sensor(SensorError::GpioReadFailed)),
            Step::Panic => panic!("sensor glitch"),
        };
        Ok(Reading::new(at)
            .with(MOTION_FIELD, motion)
            .with(SMOKE_FIELD, false))
    }
}

/// Environment port returning the same fields every time; `None` fields
/// are left out of the reading.
pub struct FixedClimate {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl FixedClimate {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature: Some(temperature),
            humidity: Some(humidity),
        }
    }

    pub fn unreadable() -> Self {
        Self {
            temperature: None,
            humidity: None,
        }
    }
}

impl EnvironmentPort for FixedClimate {
    fn sample(&mut self, at: DateTime<Local>) -> Reading {
        Reading::new(at)
            .with_opt("temperature", self.temperature)
            .with_opt("humidity", self.humidity)
    }
}

// ── Outbound collaborators ────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub sent: Arc<Mutex<Vec<(String, Value)>>>,
    pub offline: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl RecordingPublisher {
    pub fn sent_to(&self, feed: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(f, _)| f == feed)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl CloudPublisher for RecordingPublisher {
    fn publish(&mut self, feed: &str, value: &Value) -> bool {
        self.sent.lock().unwrap().push((feed.to_string(), value.clone()));
        !self.offline.load(Ordering::SeqCst)
    }
}

/// In-memory journal; appends can be made to fail per stream.
#[derive(Default)]
pub struct MemoryJournal {
    pub records: Mutex<Vec<(Stream, Reading)>>,
    pub failing: Mutex<Vec<Stream>>,
    pub syncs: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryJournal {
    pub fn stream(&self, stream: Stream) -> Vec<Reading> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, r)| r.clone())
            .collect()
    }

    pub fn fail(&self, stream: Stream, failing: bool) {
        let mut list = self.failing.lock().unwrap();
        list.retain(|s| *s != stream);
        if failing {
            list.push(stream);
        }
    }
}

impl JournalPort for MemoryJournal {
    fn append(&self, stream: Stream, record: &Reading) -> Result<()> {
        if self.failing.lock().unwrap().contains(&stream) {
            return Err(Error::Storage(std::io::ErrorKind::PermissionDenied));
        }
        self.records.lock().unwrap().push((stream, record.clone()));
        Ok(())
    }

    fn sync_all(&self) -> usize {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        0
    }
}

#[derive(Default)]
pub struct CountingAlarm {
    pub sounded: AtomicUsize,
}

impl AlarmPort for CountingAlarm {
    fn sound_alarm(&self) {
        self.sounded.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<MonitorEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn snapshot(&self) -> Vec<MonitorEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &MonitorEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
