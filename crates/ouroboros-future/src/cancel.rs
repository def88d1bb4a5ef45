//! Cancellation signal and cooperative checkpoints
//!
//! A successful `Future::cancel` fires the signal exactly once. Work launched
//! with `launch_cooperative` or `launch_async` receives a [`Checkpoint`] and
//! can observe the signal at any point: by polling, by sleeping
//! interruptibly, or by awaiting it.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::Interrupted;

/// Shared cancellation signal
///
/// The token is the flag; the mutex/condvar pair lets blocking sleepers wake
/// without missing a notification.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    token: CancellationToken,
    lock: Mutex<()>,
    fired: Condvar,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fire(&self) {
        let _guard = self.lock.lock();
        self.token.cancel();
        self.fired.notify_all();
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Block for at most `duration`; returns true if the signal fired
    fn wait_timeout(&self, duration: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(duration) else {
            let mut guard = self.lock.lock();
            while !self.token.is_cancelled() {
                self.fired.wait(&mut guard);
            }
            return true;
        };

        let mut guard = self.lock.lock();
        while !self.token.is_cancelled() {
            if self.fired.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.token.is_cancelled()
    }
}

/// Handle given to work so it can observe cancellation
///
/// # Example
///
/// ```no_run
/// use ouroboros_future::{launch_cooperative, Interrupted};
/// use std::time::Duration;
///
/// let future = launch_cooperative(|cx| {
///     let mut total = 0u64;
///     for chunk in 0..100u64 {
///         cx.checkpoint()?;
///         cx.sleep(Duration::from_millis(10))?;
///         total += chunk;
///     }
///     Ok::<_, Interrupted>(total)
/// });
/// future.cancel(true);
/// ```
#[derive(Debug, Clone)]
pub struct Checkpoint {
    signal: Arc<Signal>,
}

impl Checkpoint {
    pub(crate) fn new(signal: Arc<Signal>) -> Self {
        Self { signal }
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_fired()
    }

    /// Return `Err(Interrupted)` once cancellation has been requested
    pub fn checkpoint(&self) -> Result<(), Interrupted> {
        if self.signal.is_fired() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early with `Err(Interrupted)` on cancellation
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        if self.signal.wait_timeout(duration) {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Completes when cancellation is requested (for async work)
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.signal.token.cancelled()
    }
}
