//! Cooperative cancellation for background threads.
//!
//! A [`CancelToken`] is shared between a worker thread and whoever may
//! stop it. The worker sleeps through [`CancelToken::sleep`], which
//! returns early the moment the token is cancelled, so a stop request is
//! observed within one step rather than after a full sleep. The worker
//! reports its own exit with [`CancelToken::mark_exited`] (usually via
//! [`ExitGuard`]) and the stopper waits for that with a bounded timeout
//! before touching the hardware the worker was driving.
//!
//! ```text
//!  stopper                      worker
//!  ───────                      ──────
//!  cancel() ──── notify ─────▶  sleep() returns false
//!                               (exits loop, drops ExitGuard)
//!  wait_exited(t) ◀── notify ── mark_exited()
//! ```

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct Flags {
    cancelled: bool,
    exited: bool,
}

#[derive(Debug, Default)]
struct Inner {
    flags: Mutex<Flags>,
    changed: Condvar,
}

/// Cloneable handle to one cancellation scope.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        // The flags are plain booleans; a panic elsewhere cannot leave them
        // half-written, so a poisoned lock is still usable.
        self.inner
            .flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Request cancellation and wake any sleeper.
    pub fn cancel(&self) {
        self.flags().cancelled = true;
        self.inner.changed.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flags().cancelled
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed and the token is still
    /// live, `false` if cancelled (before or during the sleep).
    pub fn sleep(&self, duration: Duration) -> bool {
        let guard = self.flags();
        let (guard, _) = self
            .inner
            .changed
            .wait_timeout_while(guard, duration, |f| !f.cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        !guard.cancelled
    }

    /// Called by the worker once it will no longer touch shared resources.
    pub fn mark_exited(&self) {
        self.flags().exited = true;
        self.inner.changed.notify_all();
    }

    pub fn has_exited(&self) -> bool {
        self.flags().exited
    }

    /// Wait up to `timeout` for the worker's exit. Returns `true` if it
    /// exited in time.
    pub fn wait_exited(&self, timeout: Duration) -> bool {
        let guard = self.flags();
        let (guard, _) = self
            .inner
            .changed
            .wait_timeout_while(guard, timeout, |f| !f.exited)
            .unwrap_or_else(PoisonError::into_inner);
        guard.exited
    }
}

/// Marks the token exited when dropped, including on unwind.
pub struct ExitGuard(pub CancelToken);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.mark_exited();
    }
}
