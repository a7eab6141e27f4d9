//! Character display with an alert overlay.
//!
//! Two feeds drive the display:
//!
//! - **text**: free text. Remembered as the "last normal text" and shown
//!   unless an alert is active, in which case it is only buffered.
//! - **alert**: bare `ON`/`OFF`. On shows the preset message; off puts the
//!   buffered text back.
//!
//! Text is split at the first newline into two lines, each cut to the
//! display width.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, error, info, warn};

use crate::app::commands;
use crate::app::ports::{CommandBus, MessageHandler, StatusSource};
use crate::app::reading::Value;
use crate::config::{Credentials, SystemConfig};
use crate::error::{ActuatorError, Error, Result};

use super::controller::ActuatorState;

/// A character display (HD44780 behind an I²C backpack, or a stand-in).
pub trait TextDisplay: Send {
    /// Clear and write `lines` from the top-left corner.
    fn show(&mut self, lines: &[String]) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
    fn set_backlight(&mut self, on: bool) -> Result<()>;
}

/// Split `text` at the first newline and cut each line to `cols`
/// characters. At most `rows` lines.
pub fn render(text: &str, cols: usize, rows: usize) -> Vec<String> {
    text.splitn(rows.max(1), '\n')
        .map(|line| line.chars().take(cols).collect())
        .collect()
}

/// Geometry and preset for one display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    pub text_feed: String,
    pub alert_feed: String,
    pub cols: usize,
    pub rows: usize,
    pub preset_message: String,
}

impl DisplaySettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            text_feed: config.lcd_text_feed.clone(),
            alert_feed: config.lcd_alert_feed.clone(),
            cols: config.lcd_cols,
            rows: config.lcd_rows,
            preset_message: config.lcd_preset_message.clone(),
        }
    }
}

struct Screen<D> {
    display: D,
    last_text: String,
    alert: bool,
    lines: Vec<String>,
    mode: ActuatorState,
    released: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct DisplayController<D> {
    settings: DisplaySettings,
    text_topic: String,
    alert_topic: String,
    screen: Mutex<Screen<D>>,
    bus: Mutex<Option<Arc<dyn CommandBus>>>,
}

impl<D: TextDisplay + 'static> DisplayController<D> {
    pub fn new(credentials: &Credentials, settings: DisplaySettings, display: D) -> Result<Self> {
        credentials.validate()?;
        if settings.cols == 0 || settings.rows == 0 {
            return Err(Error::Config("display geometry must be non-zero"));
        }
        let text_topic = credentials.feed_topic(&settings.text_feed);
        let alert_topic = credentials.feed_topic(&settings.alert_feed);
        info!(
            "Display: {}x{} on '{}' / '{}'",
            settings.cols, settings.rows, text_topic, alert_topic
        );
        Ok(Self {
            settings,
            text_topic,
            alert_topic,
            screen: Mutex::new(Screen {
                display,
                last_text: String::new(),
                alert: false,
                lines: Vec::new(),
                mode: ActuatorState::Idle,
                released: false,
            }),
            bus: Mutex::new(None),
        })
    }

    /// Subscribe both feeds. Idempotent.
    pub fn start(self: &Arc<Self>, bus: Arc<dyn CommandBus>) -> Result<()> {
        let mut slot = lock(&self.bus);
        if slot.is_some() {
            return Ok(());
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let on_text: MessageHandler = Arc::new({
            let weak = weak.clone();
            move |payload: &str| {
                if let Some(ctrl) = weak.upgrade() {
                    ctrl.handle_text(payload);
                }
            }
        });
        let on_alert: MessageHandler = Arc::new(move |payload: &str| {
            if let Some(ctrl) = weak.upgrade() {
                ctrl.handle_alert(payload);
            }
        });
        bus.subscribe(&self.text_topic, on_text)?;
        if let Err(e) = bus.subscribe(&self.alert_topic, on_alert) {
            bus.unsubscribe(&self.text_topic);
            return Err(e);
        }
        *slot = Some(bus);
        info!("Display: started");
        Ok(())
    }

    /// Clear, backlight off, release. Safe if never started; idempotent.
    pub fn stop(&self) {
        if let Some(bus) = lock(&self.bus).take() {
            bus.unsubscribe(&self.text_topic);
            bus.unsubscribe(&self.alert_topic);
        }
        let mut screen = lock(&self.screen);
        if screen.released {
            return;
        }
        if let Err(e) = screen.display.clear() {
            error!("Display: clear failed: {}", e);
        }
        if let Err(e) = screen.display.set_backlight(false) {
            error!("Display: backlight off failed: {}", e);
        }
        screen.lines.clear();
        screen.mode = ActuatorState::Idle;
        screen.released = true;
        info!("Display: stopped");
    }

    /// A new normal text. Shown now unless an alert is up.
    pub fn handle_text(&self, payload: &str) {
        let mut screen = lock(&self.screen);
        screen.last_text = payload.trim().to_string();
        if screen.alert {
            debug!("Display: alert active, text buffered");
            return;
        }
        let text = screen.last_text.clone();
        self.show(&mut screen, &text);
    }

    /// Bare `ON`/`OFF`; anything else is ignored.
    pub fn handle_alert(&self, payload: &str) {
        let Some(on) = commands::parse_switch(payload) else {
            debug!("Display: ignoring alert payload '{}'", payload.trim());
            return;
        };
        let mut screen = lock(&self.screen);
        screen.alert = on;
        let text = if on {
            self.settings.preset_message.clone()
        } else {
            screen.last_text.clone()
        };
        self.show(&mut screen, &text);
    }

    fn show(&self, screen: &mut Screen<D>, text: &str) {
        if screen.released {
            warn!("Display: {}, ignoring update", Error::from(ActuatorError::Released));
            return;
        }
        let lines = render(text, self.settings.cols, self.settings.rows);
        match screen.display.show(&lines) {
            Ok(()) => {
                // The alert overlay is the display's autonomous mode.
                screen.mode = if screen.alert {
                    ActuatorState::PatternRunning
                } else if lines.iter().all(String::is_empty) {
                    ActuatorState::ManualOff
                } else {
                    ActuatorState::ManualOn
                };
                screen.lines = lines;
            }
            Err(e) => error!(
                "Display: {} ({})",
                Error::from(ActuatorError::DisplayWriteFailed),
                e
            ),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ActuatorState {
        lock(&self.screen).mode
    }

    /// Lines currently rendered.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.screen).lines.clone()
    }

    pub fn is_alert_active(&self) -> bool {
        lock(&self.screen).alert
    }

    pub fn last_text(&self) -> String {
        lock(&self.screen).last_text.clone()
    }
}

impl<D: TextDisplay + 'static> StatusSource for DisplayController<D> {
    fn label(&self) -> &str {
        "display"
    }

    fn status(&self) -> Vec<(String, Value)> {
        let screen = lock(&self.screen);
        let mut status = vec![
            ("alert".to_string(), Value::Bool(screen.alert)),
            ("mode".to_string(), Value::from(screen.mode.as_str())),
        ];
        status.extend(
            screen
                .lines
                .iter()
                .enumerate()
                .map(|(i, line)| (format!("line{i}"), Value::from(line.as_str()))),
        );
        status
    }
}
