//! Piezo sounder driven through a PWM channel.
//!
//! The sounder is a plain on/off output from the controller's point of
//! view. [`PwmSwitch`] adapts any `SetDutyCycle` channel (already set up
//! at `BUZZER_FREQ`) to [`OutputPin`]: high is a 50 % square wave, low is
//! fully off.

use embedded_hal::digital::{self, ErrorKind, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::error::{ActuatorError, Error};

/// Duty cycle while sounding.
pub const SOUND_DUTY_PERCENT: u8 = 50;

pub struct PwmSwitch<D> {
    channel: D,
}

impl<D: SetDutyCycle> PwmSwitch<D> {
    pub fn new(channel: D) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &D {
        &self.channel
    }
}

impl<D: SetDutyCycle> digital::ErrorType for PwmSwitch<D> {
    type Error = ErrorKind;
}

impl<D: SetDutyCycle> OutputPin for PwmSwitch<D> {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.channel
            .set_duty_cycle_percent(SOUND_DUTY_PERCENT)
            .map_err(pwm_failed)
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.channel.set_duty_cycle_fully_off().map_err(pwm_failed)
    }
}

fn pwm_failed(e: impl core::fmt::Debug) -> ErrorKind {
    warn!("Sounder: {} ({:?})", Error::from(ActuatorError::PwmWriteFailed), e);
    ErrorKind::Other
}
