//! Switch controller: command arbitration for a bank of on/off outputs.
//!
//! One generic controller serves both the lamp bank and the sounder. It
//! owns the outputs, applies manual commands, and runs at most one
//! autonomous task (a blink program, or a one-shot pulse) on a thread of
//! its own.
//!
//! ## State machine
//!
//! ```text
//!            pattern:on                     manual command
//!   Idle ─────────────────▶ PatternRunning ─────────────────▶ ManualOn / ManualOff
//!    ▲ ◀─────────────────── │                                   │
//!    │      pattern:off     │                                   │ pattern:on
//!    │      (all OFF)       ▼                                   ▼
//!    └──────────────── stop(): all OFF, task cancelled, released
//! ```
//!
//! ## Arbitration
//!
//! The task checks its [`CancelToken`] while holding the bank lock, right
//! before each write. A manual command cancels the token under that same
//! lock and then writes, so once a manual command has been applied no
//! pattern write can follow it. Lock order is task slot, then bank.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};

use crate::app::commands::{self, Command};
use crate::app::ports::{AlarmPort, CommandBus, MessageHandler, StatusSource};
use crate::app::reading::Value;
use crate::cancel::{CancelToken, ExitGuard};
use crate::config::Credentials;
use crate::error::{ActuatorError, Error, Result};

use super::led_patterns::{MASK_WIDTH, Program};

/// How long `stop()` and manual commands wait for a cancelled task.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

// ═══════════════════════════════════════════════════════════════
//  State
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorState {
    Idle,
    ManualOn,
    ManualOff,
    PatternRunning,
}

impl ActuatorState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ManualOn => "manual_on",
            Self::ManualOff => "manual_off",
            Self::PatternRunning => "pattern_running",
        }
    }
}

struct Output<P> {
    name: String,
    pin: P,
    on: bool,
}

struct Bank<P> {
    outputs: heapless::Vec<Output<P>, MASK_WIDTH>,
    mode: ActuatorState,
    released: bool,
}

impl<P: OutputPin> Bank<P> {
    /// Drive one output. A failed write is logged and leaves the recorded
    /// level unchanged.
    fn set(&mut self, label: &str, index: usize, on: bool) {
        if self.released {
            return;
        }
        let Some(out) = self.outputs.get_mut(index) else {
            return;
        };
        let res = if on {
            out.pin.set_high()
        } else {
            out.pin.set_low()
        };
        match res {
            Ok(()) => out.on = on,
            Err(e) => error!(
                "{}: {} write failed: {} ({:?})",
                label,
                out.name,
                Error::from(ActuatorError::GpioWriteFailed),
                e
            ),
        }
    }

    fn set_all(&mut self, label: &str, on: bool) {
        for i in 0..self.outputs.len() {
            self.set(label, i, on);
        }
    }

    fn apply_mask(&mut self, label: &str, mask: u8) {
        for i in 0..self.outputs.len() {
            self.set(label, i, mask & (1 << i) != 0);
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name == name)
    }

    fn manual_mode(&self) -> ActuatorState {
        if self.outputs.iter().any(|o| o.on) {
            ActuatorState::ManualOn
        } else {
            ActuatorState::ManualOff
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Pattern,
    Pulse,
}

struct Task {
    kind: TaskKind,
    token: CancelToken,
    handle: JoinHandle<()>,
}

impl Task {
    fn is_live(&self) -> bool {
        !self.token.has_exited()
    }

    /// Bounded wait for the task thread, then reap it.
    fn join(self, label: &str) {
        if !self.token.wait_exited(STOP_TIMEOUT) {
            warn!("{}: task did not exit within {:?}, detaching", label, STOP_TIMEOUT);
            return;
        }
        if self.handle.join().is_err() {
            error!("{}: task panicked", label);
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ═══════════════════════════════════════════════════════════════
//  SwitchController
// ═══════════════════════════════════════════════════════════════

pub struct SwitchController<P> {
    label: String,
    topic: String,
    bank: Arc<Mutex<Bank<P>>>,
    task: Mutex<Option<Task>>,
    bus: Mutex<Option<Arc<dyn CommandBus>>>,
    program: Option<Program>,
    pulse: Option<Duration>,
    /// Accept a bare `ON`/`OFF` payload as `all:on`/`all:off`.
    bare_switch: bool,
}

impl<P> SwitchController<P>
where
    P: OutputPin + Send + 'static,
{
    /// Build a controller listening on `<username>/feeds/<feed>`.
    ///
    /// Fails if the credentials are missing or the bank is empty or wider
    /// than [`MASK_WIDTH`]. Outputs are driven OFF here.
    pub fn new(
        label: &str,
        credentials: &Credentials,
        feed: &str,
        outputs: impl IntoIterator<Item = (String, P)>,
    ) -> Result<Self> {
        credentials.validate()?;

        let mut bank = Bank {
            outputs: heapless::Vec::new(),
            mode: ActuatorState::Idle,
            released: false,
        };
        for (name, pin) in outputs {
            let name = name.trim().to_ascii_lowercase();
            bank.outputs
                .push(Output {
                    name,
                    pin,
                    on: false,
                })
                .map_err(|_| Error::Config("too many outputs in one bank"))?;
        }
        if bank.outputs.is_empty() {
            return Err(Error::Config("output bank is empty"));
        }
        bank.set_all(label, false);

        let topic = credentials.feed_topic(feed);
        info!(
            "{}: {} output(s) on '{}'",
            label,
            bank.outputs.len(),
            topic
        );
        Ok(Self {
            label: label.to_string(),
            topic,
            bank: Arc::new(Mutex::new(bank)),
            task: Mutex::new(None),
            bus: Mutex::new(None),
            program: None,
            pulse: None,
            bare_switch: false,
        })
    }

    /// Autonomous program run by `pattern:on`.
    #[must_use]
    pub fn with_program(mut self, program: Program) -> Self {
        self.program = Some(program);
        self
    }

    /// Length of [`pulse`](Self::pulse).
    #[must_use]
    pub fn with_pulse(mut self, length: Duration) -> Self {
        self.pulse = Some(length);
        self
    }

    #[must_use]
    pub fn with_bare_switch(mut self) -> Self {
        self.bare_switch = true;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Subscribe the feed topic. Idempotent.
    pub fn start(self: &Arc<Self>, bus: Arc<dyn CommandBus>) -> Result<()> {
        let mut slot = lock(&self.bus);
        if slot.is_some() {
            return Ok(());
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let handler: MessageHandler = Arc::new(move |payload: &str| {
            if let Some(ctrl) = weak.upgrade() {
                ctrl.handle_payload(payload);
            }
        });
        bus.subscribe(&self.topic, handler)?;
        *slot = Some(bus);
        info!("{}: started", self.label);
        Ok(())
    }

    /// Unsubscribe, cancel any task, force every output OFF and release
    /// the hardware. Safe if never started; idempotent.
    pub fn stop(&self) {
        if let Some(bus) = lock(&self.bus).take() {
            bus.unsubscribe(&self.topic);
        }

        let mut slot = lock(&self.task);
        let stale = slot.take();
        {
            let mut bank = lock(&self.bank);
            if bank.released {
                return;
            }
            if let Some(task) = &stale {
                task.token.cancel();
            }
            bank.set_all(&self.label, false);
            bank.mode = ActuatorState::Idle;
            bank.released = true;
        }
        drop(slot);

        if let Some(task) = stale {
            task.join(&self.label);
        }
        info!("{}: stopped, outputs released", self.label);
    }

    // ── Commands ──────────────────────────────────────────────

    /// Apply one whole inbound message, left to right.
    pub fn handle_payload(&self, payload: &str) {
        let payload = payload.trim();
        debug!("{}: payload '{}'", self.label, payload);
        if self.bare_switch && !payload.contains(':') {
            match commands::parse_switch(payload) {
                Some(on) => self.handle_command(&Command::all(on)),
                None => debug!("{}: ignoring '{}'", self.label, payload),
            }
            return;
        }
        for cmd in commands::parse(payload) {
            self.handle_command(&cmd);
        }
    }

    pub fn handle_command(&self, cmd: &Command) {
        match cmd {
            Command::AllOn | Command::AllOff | Command::Device { .. } => self.apply_manual(cmd),
            Command::PatternOn => self.start_pattern(),
            Command::PatternOff => self.stop_pattern(),
            Command::Unrecognized => {}
        }
    }

    fn apply_manual(&self, cmd: &Command) {
        let mut slot = lock(&self.task);
        let stale = slot.take();
        {
            let mut bank = lock(&self.bank);
            if bank.released {
                warn!(
                    "{}: {}, ignoring {:?}",
                    self.label,
                    Error::from(ActuatorError::Released),
                    cmd
                );
                return;
            }
            // Cancel under the bank lock: the task cannot write after this.
            if let Some(task) = &stale {
                task.token.cancel();
            }
            match cmd {
                Command::AllOn => bank.set_all(&self.label, true),
                Command::AllOff => bank.set_all(&self.label, false),
                Command::Device { name, on } => match bank.index_of(name) {
                    Some(i) => bank.set(&self.label, i, *on),
                    None => warn!("{}: no output named '{}'", self.label, name),
                },
                _ => {}
            }
            bank.mode = bank.manual_mode();
        }
        drop(slot);

        if let Some(task) = stale {
            if task.kind == TaskKind::Pattern {
                info!("{}: pattern cancelled by manual command", self.label);
            }
            task.join(&self.label);
        }
    }

    fn start_pattern(&self) {
        let Some(program) = self.program.clone() else {
            debug!("{}: no pattern configured", self.label);
            return;
        };
        let mut slot = lock(&self.task);
        if slot
            .as_ref()
            .is_some_and(|t| t.kind == TaskKind::Pattern && t.is_live())
        {
            return;
        }
        let stale = slot.take();
        if let Some(task) = &stale {
            task.token.cancel();
        }
        if lock(&self.bank).released {
            return;
        }

        let token = CancelToken::new();
        match self.spawn(TaskKind::Pattern, token.clone(), move |bank, label, token| {
            run_program(bank, label, program, token);
        }) {
            Ok(handle) => {
                lock(&self.bank).mode = ActuatorState::PatternRunning;
                *slot = Some(Task {
                    kind: TaskKind::Pattern,
                    token,
                    handle,
                });
                info!("{}: pattern started", self.label);
            }
            Err(e) => error!("{}: cannot spawn pattern task: {}", self.label, e),
        }
        drop(slot);

        if let Some(task) = stale {
            task.join(&self.label);
        }
    }

    fn stop_pattern(&self) {
        let mut slot = lock(&self.task);
        let stale = slot.take_if(|t| t.kind == TaskKind::Pattern);
        {
            let mut bank = lock(&self.bank);
            if let Some(task) = &stale {
                task.token.cancel();
            }
            if !bank.released {
                bank.set_all(&self.label, false);
                bank.mode = ActuatorState::Idle;
            }
        }
        drop(slot);

        if let Some(task) = stale {
            task.join(&self.label);
            info!("{}: pattern stopped", self.label);
        }
    }

    /// Sound every output for the configured pulse length, then turn them
    /// OFF. A manual command cancels the pulse. A running pattern and a
    /// manual ON are left alone.
    pub fn pulse(&self) {
        let Some(length) = self.pulse else {
            return;
        };
        let mut slot = lock(&self.task);
        if slot.as_ref().is_some_and(Task::is_live) {
            return;
        }
        let stale = slot.take();
        {
            let bank = lock(&self.bank);
            if bank.released {
                return;
            }
            if bank.mode == ActuatorState::ManualOn {
                debug!("{}: manually on, pulse skipped", self.label);
                return;
            }
        }

        let token = CancelToken::new();
        match self.spawn(TaskKind::Pulse, token.clone(), move |bank, label, token| {
            run_pulse(bank, label, length, token);
        }) {
            Ok(handle) => {
                *slot = Some(Task {
                    kind: TaskKind::Pulse,
                    token,
                    handle,
                });
            }
            Err(e) => error!("{}: cannot spawn pulse task: {}", self.label, e),
        }
        drop(slot);

        if let Some(task) = stale {
            task.join(&self.label);
        }
    }

    fn spawn<F>(&self, kind: TaskKind, token: CancelToken, body: F) -> std::io::Result<JoinHandle<()>>
    where
        F: FnOnce(Arc<Mutex<Bank<P>>>, String, CancelToken) + Send + 'static,
    {
        let bank = Arc::clone(&self.bank);
        let label = self.label.clone();
        let suffix = match kind {
            TaskKind::Pattern => "pattern",
            TaskKind::Pulse => "pulse",
        };
        let name = format!("{}-{}", self.label.to_ascii_lowercase(), suffix);
        thread::Builder::new().name(name).spawn(move || {
            let _exit = ExitGuard(token.clone());
            body(bank, label, token);
        })
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ActuatorState {
        lock(&self.bank).mode
    }

    /// `(name, on)` for every output, in bank order.
    pub fn outputs(&self) -> Vec<(String, bool)> {
        lock(&self.bank)
            .outputs
            .iter()
            .map(|o| (o.name.clone(), o.on))
            .collect()
    }

    pub fn is_on(&self, name: &str) -> Option<bool> {
        let bank = lock(&self.bank);
        bank.index_of(name).map(|i| bank.outputs[i].on)
    }

    pub fn is_pattern_running(&self) -> bool {
        lock(&self.task)
            .as_ref()
            .is_some_and(|t| t.kind == TaskKind::Pattern && t.is_live())
    }

    pub fn is_released(&self) -> bool {
        lock(&self.bank).released
    }
}

impl<P> Drop for SwitchController<P> {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.token.cancel();
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Task bodies
// ═══════════════════════════════════════════════════════════════

fn run_program<P: OutputPin>(
    bank: Arc<Mutex<Bank<P>>>,
    label: String,
    program: Program,
    token: CancelToken,
) {
    let mut rng = rand::thread_rng();
    let mut cycle = program;
    loop {
        for frame in cycle.frames() {
            {
                let mut bank = lock(&bank);
                if token.is_cancelled() || bank.released {
                    return;
                }
                bank.apply_mask(&label, frame.mask);
            }
            if !token.sleep(frame.hold()) {
                return;
            }
        }
        cycle = cycle.next_cycle(&mut rng);
        if cycle.id().is_random() {
            debug!("{}: next {} cycle, {} frame(s)", label, cycle.id().as_str(), cycle.frames().len());
        }
    }
}

fn run_pulse<P: OutputPin>(
    bank: Arc<Mutex<Bank<P>>>,
    label: String,
    length: Duration,
    token: CancelToken,
) {
    {
        let mut bank = lock(&bank);
        if token.is_cancelled() || bank.released {
            return;
        }
        bank.set_all(&label, true);
        bank.mode = ActuatorState::PatternRunning;
    }
    token.sleep(length);
    let mut bank = lock(&bank);
    if token.is_cancelled() || bank.released {
        return;
    }
    bank.set_all(&label, false);
    bank.mode = ActuatorState::Idle;
}

// ═══════════════════════════════════════════════════════════════
//  Ports
// ═══════════════════════════════════════════════════════════════

impl<P> AlarmPort for SwitchController<P>
where
    P: OutputPin + Send + 'static,
{
    fn sound_alarm(&self) {
        self.pulse();
    }
}

impl<P> StatusSource for SwitchController<P>
where
    P: OutputPin + Send + 'static,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn status(&self) -> Vec<(String, Value)> {
        let bank = lock(&self.bank);
        bank.outputs
            .iter()
            .map(|o| (o.name.clone(), Value::Bool(o.on)))
            .chain(std::iter::once((
                "mode".to_string(),
                Value::from(bank.mode.as_str()),
            )))
            .collect()
    }
}
