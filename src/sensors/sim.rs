//! Host stand-ins for the probe and the detector inputs.
//!
//! Used by the binary when no hardware is attached. Values wander
//! plausibly so the logs and dashboards have something to show.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::environment::{Climate, Hygrometer};
use crate::error::{Error, Result, SensorError};

/// Random-walk temperature/humidity with an occasional failed read.
pub struct SimHygrometer {
    rng: StdRng,
    climate: Climate,
    failure_rate: f64,
}

impl SimHygrometer {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible sequence for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            rng,
            climate: Climate {
                celsius: 21.0,
                humidity_percent: 45.0,
            },
            failure_rate: 0.1,
        }
    }

    #[must_use]
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }
}

impl Default for SimHygrometer {
    fn default() -> Self {
        Self::new()
    }
}

impl Hygrometer for SimHygrometer {
    fn read(&mut self) -> Result<Climate> {
        if self.rng.gen_bool(self.failure_rate) {
            return Err(Error::Sensor(SensorError::NoData));
        }
        let c = &mut self.climate;
        c.celsius = (c.celsius + self.rng.gen_range(-0.3..=0.3)).clamp(10.0, 35.0);
        c.humidity_percent = (c.humidity_percent + self.rng.gen_range(-1.0..=1.0)).clamp(20.0, 90.0);
        // DHT11 resolution is whole units.
        Ok(Climate {
            celsius: c.celsius.round(),
            humidity_percent: c.humidity_percent.round(),
        })
    }
}

/// A digital input that reads high with a fixed probability.
pub struct SimInput {
    rng: StdRng,
    probability: f64,
}

impl SimInput {
    pub fn new(probability: f64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            probability: probability.clamp(0.0, 1.0),
        }
    }
}

impl ErrorType for SimInput {
    type Error = Infallible;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> core::result::Result<bool, Infallible> {
        Ok(self.rng.gen_bool(self.probability))
    }

    fn is_low(&mut self) -> core::result::Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}
