//! Motion and smoke sampling.
//!
//! Both detectors are digital inputs, high when triggered. When the camera
//! is enabled and motion is seen, a [`Capture`] collaborator may attach the
//! path of the image it stored.

use chrono::{DateTime, Local};
use embedded_hal::digital::InputPin;
use log::{debug, warn};

use crate::app::ports::SecurityPort;
use crate::app::reading::Reading;
use crate::app::service::{MOTION_FIELD, SMOKE_FIELD};
use crate::error::{Error, Result, SensorError};

pub const IMAGE_FIELD: &str = "image_path";

/// Still-image capture on motion.
pub trait Capture: Send {
    /// Store one frame; `None` if nothing was captured.
    fn capture(&mut self, at: DateTime<Local>) -> Option<String>;
}

pub struct SecurityProbe<M, S> {
    motion: M,
    smoke: S,
    camera: Option<Box<dyn Capture>>,
    camera_enabled: bool,
}

impl<M: InputPin, S: InputPin> SecurityProbe<M, S> {
    pub fn new(motion: M, smoke: S, camera_enabled: bool) -> Self {
        Self {
            motion,
            smoke,
            camera: None,
            camera_enabled,
        }
    }

    #[must_use]
    pub fn with_camera(mut self, camera: Box<dyn Capture>) -> Self {
        self.camera = Some(camera);
        self
    }
}

impl<M: InputPin, S: InputPin> SecurityPort for SecurityProbe<M, S> {
    fn sample(&mut self, at: DateTime<Local>) -> Result<Reading> {
        let motion = self.motion.is_high().map_err(|e| {
            warn!("Security: PIR read failed: {:?}", e);
            Error::Sensor(SensorError::GpioReadFailed)
        })?;
        let smoke = self.smoke.is_high().map_err(|e| {
            warn!("Security: smoke read failed: {:?}", e);
            Error::Sensor(SensorError::GpioReadFailed)
        })?;
        debug!("Security: motion={} smoke={}", motion, smoke);

        let image = match &mut self.camera {
            Some(camera) if motion && self.camera_enabled => camera.capture(at),
            _ => None,
        };
        Ok(Reading::new(at)
            .with(MOTION_FIELD, motion)
            .with(SMOKE_FIELD, smoke)
            .with_opt(IMAGE_FIELD, image))
    }
}
