//! Controller wiring and ordered shutdown.
//!
//! ```text
//!  start:    build controllers ─▶ subscribe feeds ─▶ spawn monitor
//!  shutdown: stop monitor (bounded) ─▶ stop controllers ─▶ transport
//! ```
//!
//! The transport is torn down by the caller after [`shutdown`] returns,
//! since only the caller knows which one is in use.

use std::sync::Arc;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::app::ports::{AlarmPort, CommandBus, StatusSource};
use crate::app::runner::MonitorRunner;
use crate::config::SystemConfig;
use crate::drivers::controller::SwitchController;
use crate::drivers::display::{DisplayController, DisplaySettings, TextDisplay};
use crate::drivers::led_patterns::{PatternId, Program};
use crate::error::Result;

/// Lamp names, in pin order.
pub const LAMP_NAMES: [&str; 3] = ["red", "yellow", "green"];

/// Name of the sounder's single output.
pub const SOUNDER_OUTPUT: &str = "buzzer";

/// Every actuator controller of the unit.
pub struct Controllers<L, S, D> {
    pub lamps: Arc<SwitchController<L>>,
    pub sounder: Arc<SwitchController<S>>,
    pub display: Arc<DisplayController<D>>,
}

impl<L, S, D> Controllers<L, S, D>
where
    L: OutputPin + Send + 'static,
    S: OutputPin + Send + 'static,
    D: TextDisplay + 'static,
{
    /// Build all three. Missing credentials fail here.
    ///
    /// `lamp_pins` are red, yellow, green.
    pub fn build(config: &SystemConfig, lamp_pins: [L; 3], sounder: S, display: D) -> Result<Self> {
        let credentials = config.credentials();

        let pattern = config.led_pattern.parse::<PatternId>().unwrap_or_else(|_| {
            warn!(
                "Lamps: unknown LED_PATTERN '{}', using {}",
                config.led_pattern,
                PatternId::default().as_str()
            );
            PatternId::default()
        });
        let lamp_outputs = LAMP_NAMES
            .iter()
            .map(|n| (*n).to_string())
            .zip(lamp_pins);
        let lamps = SwitchController::new("Lamps", &credentials, &config.leds_feed, lamp_outputs)?
            .with_program(Program::new(pattern, LAMP_NAMES.len()));

        let sounder = SwitchController::new(
            "Sounder",
            &credentials,
            &config.buzzer_feed,
            [(SOUNDER_OUTPUT.to_string(), sounder)],
        )?
        .with_bare_switch()
        .with_pulse(Duration::from_millis(config.buzzer_pulse_ms));

        let display =
            DisplayController::new(&credentials, DisplaySettings::from_config(config), display)?;

        Ok(Self {
            lamps: Arc::new(lamps),
            sounder: Arc::new(sounder),
            display: Arc::new(display),
        })
    }

    /// Subscribe every controller's feeds.
    pub fn start(&self, bus: &Arc<dyn CommandBus>) -> Result<()> {
        self.lamps.start(Arc::clone(bus))?;
        self.sounder.start(Arc::clone(bus))?;
        self.display.start(Arc::clone(bus))?;
        info!("Controllers: started");
        Ok(())
    }

    /// Stop every controller. Safe to call more than once.
    pub fn stop(&self) {
        self.lamps.stop();
        self.sounder.stop();
        self.display.stop();
        info!("Controllers: stopped");
    }

    /// What the monitor sounds on a detection.
    pub fn alarm(&self) -> Arc<dyn AlarmPort> {
        Arc::clone(&self.sounder) as Arc<dyn AlarmPort>
    }

    /// What the monitor snapshots into `device_status`.
    pub fn status_sources(&self) -> Vec<Arc<dyn StatusSource>> {
        vec![
            Arc::clone(&self.lamps) as Arc<dyn StatusSource>,
            Arc::clone(&self.sounder) as Arc<dyn StatusSource>,
            Arc::clone(&self.display) as Arc<dyn StatusSource>,
        ]
    }
}

/// Stop the monitor (waiting at most `timeout`), then the controllers.
///
/// Controllers are stopped even if the monitor missed its deadline.
/// Returns whether the monitor exited in time.
pub fn shutdown<L, S, D>(
    runner: &mut MonitorRunner,
    controllers: &Controllers<L, S, D>,
    timeout: Duration,
) -> bool
where
    L: OutputPin + Send + 'static,
    S: OutputPin + Send + 'static,
    D: TextDisplay + 'static,
{
    info!("Shutdown: stopping monitor");
    let clean = runner.stop(timeout);
    if !clean {
        warn!("Shutdown: monitor still running, stopping controllers anyway");
    }
    controllers.stop();
    clean
}
