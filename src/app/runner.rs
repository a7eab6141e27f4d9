//! Background monitor thread.
//!
//! [`MonitorRunner`] moves a [`MonitorService`] and its collaborators onto
//! a dedicated thread and drives it:
//!
//! ```text
//!  loop {
//!      tick()  ── Ok ──────────▶ sleep(security_check_interval)
//!              ── Err / panic ─▶ log, sleep(error_backoff)
//!  } until cancelled
//!  final sync_all()
//! ```
//!
//! Sleeps go through the [`CancelToken`], so [`MonitorRunner::stop`]
//! takes effect within one step instead of one full interval.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};

use crate::cancel::{CancelToken, ExitGuard};

use super::events::MonitorEvent;
use super::ports::{Clock, CloudPublisher, EnvironmentPort, EventSink, JournalPort, SecurityPort};
use super::service::{Collaborators, MonitorService};

pub struct MonitorRunner {
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl MonitorRunner {
    /// Spawn the monitor thread.
    pub fn spawn<S, E, C, K, Sk>(
        service: MonitorService,
        io: Collaborators<S, E, C>,
        clock: K,
        sink: Sk,
    ) -> std::io::Result<Self>
    where
        S: SecurityPort + Send + 'static,
        E: EnvironmentPort + Send + 'static,
        C: CloudPublisher + Send + 'static,
        K: Clock + Send + 'static,
        Sk: EventSink + Send + 'static,
    {
        let token = CancelToken::new();
        let worker = token.clone();
        let handle = thread::Builder::new()
            .name("monitor".into())
            .spawn(move || run_loop(service, io, &clock, sink, &worker))?;
        info!("Monitor: thread started");
        Ok(Self {
            token,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && !self.token.has_exited()
    }

    /// Signal the loop and wait up to `timeout` for it to finish.
    ///
    /// Returns `true` if the thread exited in time. A thread that misses
    /// the deadline is detached; it stops at its next sleep boundary.
    /// Idempotent.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };
        self.token.cancel();
        if !self.token.wait_exited(timeout) {
            warn!(
                "Monitor: thread did not exit within {}s, detaching",
                timeout.as_secs()
            );
            return false;
        }
        if handle.join().is_err() {
            error!("Monitor: thread panicked during shutdown");
        }
        info!("Monitor: thread stopped");
        true
    }
}

impl Drop for MonitorRunner {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The loop body, callable directly on the current thread.
///
/// Returns once `token` is cancelled. Every failed iteration, including a
/// panic inside a collaborator, is logged and followed by the backoff
/// pause; the loop itself never dies from one.
pub fn run_loop<S, E, C>(
    mut service: MonitorService,
    mut io: Collaborators<S, E, C>,
    clock: &impl Clock,
    mut sink: impl EventSink,
    token: &CancelToken,
) where
    S: SecurityPort,
    E: EnvironmentPort,
    C: CloudPublisher,
{
    let _exit = ExitGuard(token.clone());
    let intervals = *service.intervals();
    sink.emit(&MonitorEvent::Started);
    info!("Monitor: loop running");

    while !token.is_cancelled() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            service.tick(clock, &mut io, &mut sink)
        }));
        let pause = match outcome {
            Ok(Ok(())) => intervals.security_check,
            Ok(Err(e)) => {
                error!("Monitor: iteration failed: {}", e);
                sink.emit(&MonitorEvent::CycleFailed {
                    reason: e.to_string(),
                });
                intervals.error_backoff
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!("Monitor: iteration panicked: {}", reason);
                sink.emit(&MonitorEvent::CycleFailed { reason });
                intervals.error_backoff
            }
        };
        if !token.sleep(pause) {
            break;
        }
    }

    flush_on_exit(&io.journal);
    sink.emit(&MonitorEvent::Stopped);
    info!("Monitor: loop exited");
}

fn flush_on_exit(journal: &Arc<dyn JournalPort>) {
    let failures = journal.sync_all();
    if failures > 0 {
        warn!("Monitor: {} log stream(s) failed the final sync", failures);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
