//! Console adapters for running without hardware.
//!
//! Every actuator write and every outbound publish becomes a log line, so
//! the whole controller can be exercised on a laptop. [`LogEventSink`]
//! renders monitor events the same way on real hardware too.

use core::convert::Infallible;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use log::{info, warn};

use crate::app::events::MonitorEvent;
use crate::app::ports::{CloudPublisher, EventSink};
use crate::app::reading::Value;
use crate::drivers::display::TextDisplay;
use crate::error::Result;

// ───────────────────────────────────────────────────────────────
// Pins
// ───────────────────────────────────────────────────────────────

/// A GPIO output that logs its level changes.
pub struct LogPin {
    name: String,
    gpio: u8,
    high: bool,
}

impl LogPin {
    pub fn new(name: &str, gpio: u8) -> Self {
        Self {
            name: name.to_string(),
            gpio,
            high: false,
        }
    }

    fn drive(&mut self, high: bool) {
        if self.high != high {
            info!(
                "GPIO{} ({}) -> {}",
                self.gpio,
                self.name,
                if high { "HIGH" } else { "LOW" }
            );
        }
        self.high = high;
    }
}

impl digital::ErrorType for LogPin {
    type Error = Infallible;
}

impl OutputPin for LogPin {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }
}

/// A PWM channel that logs duty changes.
pub struct LogPwm {
    gpio: u8,
    freq_hz: u32,
    duty: u16,
}

impl LogPwm {
    pub const MAX_DUTY: u16 = 1000;

    pub fn new(gpio: u8, freq_hz: u32) -> Self {
        Self {
            gpio,
            freq_hz,
            duty: 0,
        }
    }
}

impl pwm::ErrorType for LogPwm {
    type Error = Infallible;
}

impl SetDutyCycle for LogPwm {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> core::result::Result<(), Infallible> {
        if duty != self.duty {
            info!(
                "PWM{} @ {} Hz -> duty {}/{}",
                self.gpio,
                self.freq_hz,
                duty,
                Self::MAX_DUTY
            );
        }
        self.duty = duty;
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Display
// ───────────────────────────────────────────────────────────────

/// Prints what a character display would show.
pub struct ConsoleDisplay {
    address: u8,
}

impl ConsoleDisplay {
    pub fn new(address: u8) -> Self {
        Self { address }
    }
}

impl TextDisplay for ConsoleDisplay {
    fn show(&mut self, lines: &[String]) -> Result<()> {
        for (row, line) in lines.iter().enumerate() {
            info!("LCD@0x{:02x} [{}] |{}|", self.address, row, line);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        info!("LCD@0x{:02x} cleared", self.address);
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<()> {
        info!(
            "LCD@0x{:02x} backlight {}",
            self.address,
            if on { "on" } else { "off" }
        );
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Telemetry
// ───────────────────────────────────────────────────────────────

/// Stand-in publisher for runs without a broker. Always succeeds.
#[derive(Default)]
pub struct LogPublisher;

impl CloudPublisher for LogPublisher {
    fn publish(&mut self, feed: &str, value: &Value) -> bool {
        info!("PUBLISH | {} <- {}", feed, value);
        true
    }
}

// ───────────────────────────────────────────────────────────────
// Events
// ───────────────────────────────────────────────────────────────

/// Adapter that logs every [`MonitorEvent`].
#[derive(Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &MonitorEvent) {
        match event {
            MonitorEvent::Started => info!("START | monitor loop"),
            MonitorEvent::Detection {
                motion,
                smoke,
                motion_total,
                smoke_total,
            } => {
                warn!(
                    "ALERT | motion={} smoke={} | window totals motion={} smoke={}",
                    motion, smoke, motion_total, smoke_total
                );
            }
            MonitorEvent::SummarySent(s) => {
                info!(
                    "SUMMARY | motion={} smoke={} | delivered={}",
                    s.motion_count, s.smoke_count, s.published
                );
            }
            MonitorEvent::Environment { reading, published } => {
                let fields: Vec<String> = reading
                    .fields()
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                info!(
                    "ENV | {} | delivered={}",
                    if fields.is_empty() {
                        "no data".to_string()
                    } else {
                        fields.join(" ")
                    },
                    published
                );
            }
            MonitorEvent::LogsSynced { failures } => {
                if *failures > 0 {
                    warn!("SYNC | {} stream(s) failed", failures);
                }
            }
            MonitorEvent::CycleFailed { reason } => warn!("CYCLE | failed: {}", reason),
            MonitorEvent::Stopped => info!("STOP | monitor loop"),
        }
    }
}
