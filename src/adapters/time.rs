//! Host clock adapter.
//!
//! Monotonic time is measured from construction with `Instant`, so it
//! never goes backwards even when NTP steps the wall clock. Wall time is
//! local time, used only for record timestamps and log file names.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::app::ports::Clock;

pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn monotonic(&self) -> Duration {
        self.start.elapsed()
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}
