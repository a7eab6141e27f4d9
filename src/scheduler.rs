//! Interval timers for the monitor loop.
//!
//! Each timer remembers the monotonic instant it last fired. The monitor
//! polls [`Scheduler::due`] once per iteration and handles the returned
//! timers in the fixed order of [`TimerId::ALL`]:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  every security_check_interval                               │
//! │                                                              │
//! │  security_check ──▶ sample PIR/smoke, count detections       │
//! │  security_send  ──▶ publish summary, reset counters          │
//! │  env_check      ──▶ sample + log + publish environment       │
//! │  log_sync       ──▶ flush + fsync daily logs                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A timer is only advanced once its work succeeded, so a failed step is
//! retried on the next iteration.

use core::time::Duration;

use heapless::Vec;
use log::info;

use crate::config::Intervals;

// ═══════════════════════════════════════════════════════════════
//  Timer identities
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerId {
    SecurityCheck,
    SecuritySend,
    EnvCheck,
    LogSync,
}

const TIMER_COUNT: usize = 4;

impl TimerId {
    /// Handling order within one iteration.
    pub const ALL: [TimerId; TIMER_COUNT] = [
        Self::SecurityCheck,
        Self::SecuritySend,
        Self::EnvCheck,
        Self::LogSync,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SecurityCheck => "security_check",
            Self::SecuritySend => "security_send",
            Self::EnvCheck => "env_check",
            Self::LogSync => "log_sync",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
struct Timer {
    interval: Duration,
    /// `None` until the first fire; an unarmed timer is due immediately.
    last_fired: Option<Duration>,
}

impl Timer {
    fn is_due(&self, now: Duration) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval,
        }
    }
}

/// The monitor's timer table. Owned by the monitor thread, no locking.
pub struct Scheduler {
    timers: [Timer; TIMER_COUNT],
}

impl Scheduler {
    /// Sampling timers start unarmed so the first iteration samples
    /// straight away; the summary timer is armed at `now` so the first
    /// summary covers a full window.
    pub fn new(intervals: &Intervals, now: Duration) -> Self {
        let timer = |interval, last_fired| Timer {
            interval,
            last_fired,
        };
        let sched = Self {
            timers: [
                timer(intervals.security_check, None),
                timer(intervals.security_send, Some(now)),
                timer(intervals.env_check, None),
                timer(intervals.log_sync, None),
            ],
        };
        info!(
            "Scheduler: security every {}s, summary every {}s, environment every {}s, sync every {}s",
            intervals.security_check.as_secs(),
            intervals.security_send.as_secs(),
            intervals.env_check.as_secs(),
            intervals.log_sync.as_secs()
        );
        sched
    }

    pub fn is_due(&self, id: TimerId, now: Duration) -> bool {
        self.timers[id.index()].is_due(now)
    }

    /// Every due timer, in handling order.
    pub fn due(&self, now: Duration) -> Vec<TimerId, TIMER_COUNT> {
        TimerId::ALL
            .iter()
            .copied()
            .filter(|id| self.is_due(*id, now))
            .collect()
    }

    /// Record a fire at `now`. The stored instant never moves backwards.
    pub fn mark_fired(&mut self, id: TimerId, now: Duration) {
        let timer = &mut self.timers[id.index()];
        timer.last_fired = Some(match timer.last_fired {
            Some(last) if last > now => last,
            _ => now,
        });
    }

    pub fn last_fired(&self, id: TimerId) -> Option<Duration> {
        self.timers[id.index()].last_fired
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
