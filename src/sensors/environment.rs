//! Temperature/humidity acquisition with bounded retries.
//!
//! DHT-class probes fail often (timing-sensitive single-wire protocol), so
//! [`RetryingProbe`] tries a fixed number of times with a pause between
//! attempts. When every attempt fails the reading carries a timestamp and
//! nothing else; the monitor logs it as-is and publishes nothing.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{debug, warn};

use crate::app::ports::EnvironmentPort;
use crate::app::reading::Reading;
use crate::error::{Error, Result, SensorError};

pub const TEMPERATURE_FIELD: &str = "temperature";
pub const HUMIDITY_FIELD: &str = "humidity";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Climate {
    pub celsius: f64,
    pub humidity_percent: f64,
}

/// One attempt at reading the probe.
pub trait Hygrometer: Send {
    fn read(&mut self) -> Result<Climate>;
}

pub struct RetryingProbe<H> {
    hygrometer: H,
    attempts: u32,
    delay: Duration,
}

impl<H: Hygrometer> RetryingProbe<H> {
    pub fn new(hygrometer: H, attempts: u32, delay: Duration) -> Self {
        Self {
            hygrometer,
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Up to `attempts` reads, sleeping `delay` after each failure except
    /// the last.
    pub fn read_with_retry(&mut self) -> Option<Climate> {
        for attempt in 1..=self.attempts {
            match self.hygrometer.read() {
                Ok(climate) => return Some(climate),
                Err(e) => {
                    debug!(
                        "Environment: attempt {}/{} failed: {}",
                        attempt, self.attempts, e
                    );
                    if attempt < self.attempts {
                        thread::sleep(self.delay);
                    }
                }
            }
        }
        warn!(
            "Environment: {} ({} attempts)",
            Error::from(SensorError::RetriesExhausted),
            self.attempts
        );
        None
    }
}

impl<H: Hygrometer> EnvironmentPort for RetryingProbe<H> {
    fn sample(&mut self, at: DateTime<Local>) -> Reading {
        match self.read_with_retry() {
            Some(c) => Reading::new(at)
                .with(TEMPERATURE_FIELD, c.celsius)
                .with(HUMIDITY_FIELD, c.humidity_percent),
            None => Reading::new(at),
        }
    }
}
