//! Future handle: the caller's view of a launched task

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cancel::{Checkpoint, Signal};
use crate::error::{CANCELLED_MESSAGE, TIMEOUT_MESSAGE};
use crate::{
    CancellationError, ExecutionError, FutureError, FutureState, FutureStatus, TimeoutError,
};

/// Unique future identifier using UUID v7 (time-ordered)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FutureId(pub uuid::Uuid);

impl FutureId {
    /// Create a new future ID
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }
}

impl Default for FutureId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FutureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tagged outcome; the result and the error live inside their state
enum Outcome<T> {
    Pending,
    Running,
    Succeeded(T),
    Cancelled(CancellationError),
    Failed(ExecutionError),
}

impl<T> Outcome<T> {
    fn state(&self) -> FutureState {
        match self {
            Outcome::Pending => FutureState::Pending,
            Outcome::Running => FutureState::Running,
            Outcome::Succeeded(_) => FutureState::Succeeded,
            Outcome::Cancelled(_) => FutureState::Cancelled,
            Outcome::Failed(_) => FutureState::Failed,
        }
    }
}

impl<T: Clone> Outcome<T> {
    /// The terminal outcome, or `None` while still pending/running
    fn settled(&self) -> Option<Result<T, FutureError>> {
        match self {
            Outcome::Pending | Outcome::Running => None,
            Outcome::Succeeded(value) => Some(Ok(value.clone())),
            Outcome::Cancelled(err) => Some(Err(err.clone().into())),
            Outcome::Failed(err) => Some(Err(err.clone().into())),
        }
    }
}

struct Inner<T> {
    outcome: Outcome<T>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl<T> Inner<T> {
    /// Move to `next` if the state machine allows it
    fn transition(&mut self, next: Outcome<T>) -> bool {
        if !self.outcome.state().can_transition_to(next.state()) {
            return false;
        }
        let now = Utc::now();
        match next.state() {
            FutureState::Running => self.started_at = Some(now),
            s if s.is_terminal() => self.finished_at = Some(now),
            _ => {}
        }
        self.outcome = next;
        true
    }
}

/// State shared between the caller's handles and the execution unit
pub(crate) struct Shared<T> {
    id: FutureId,
    launched_at: DateTime<Utc>,
    inner: Mutex<Inner<T>>,
    settled: Condvar,
    signal: Arc<Signal>,
}

impl<T> Shared<T> {
    pub(crate) fn new() -> Self {
        Self {
            id: FutureId::new(),
            launched_at: Utc::now(),
            inner: Mutex::new(Inner {
                outcome: Outcome::Pending,
                started_at: None,
                finished_at: None,
            }),
            settled: Condvar::new(),
            signal: Arc::new(Signal::new()),
        }
    }

    pub(crate) fn id(&self) -> FutureId {
        self.id
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.signal.clone())
    }

    /// Pending -> Running. False if cancelled before the work could start.
    pub(crate) fn begin(&self) -> bool {
        self.inner.lock().transition(Outcome::Running)
    }

    /// Record the work's outcome. False if the future already settled
    /// (cancelled while running), in which case the outcome is dropped.
    pub(crate) fn complete(&self, result: Result<T, ExecutionError>) -> bool {
        let next = match result {
            Ok(value) => Outcome::Succeeded(value),
            Err(err) => Outcome::Failed(err),
        };
        let mut inner = self.inner.lock();
        if !inner.transition(next) {
            return false;
        }
        self.settled.notify_all();
        true
    }

    fn cancel(&self, interrupt: bool) -> bool {
        {
            let mut inner = self.inner.lock();
            match inner.outcome.state() {
                FutureState::Pending => {}
                FutureState::Running if interrupt => {}
                _ => return false,
            }
            let error = CancellationError::new(CANCELLED_MESSAGE);
            if !inner.transition(Outcome::Cancelled(error)) {
                return false;
            }
            self.settled.notify_all();
        }
        self.signal.fire();
        true
    }
}

/// Handle to the eventual outcome of a launched task
///
/// Handles are cheap to clone; every clone observes the same task. The
/// execution unit is the only writer of the outcome, `cancel` the only
/// other one, and both go through the same state machine so readers never
/// see a torn update.
pub struct Future<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<T> Future<T> {
    pub(crate) fn from_shared(shared: Arc<Shared<T>>) -> Self {
        Self { shared }
    }

    pub fn id(&self) -> FutureId {
        self.shared.id
    }

    /// Current state
    pub fn state(&self) -> FutureState {
        self.shared.inner.lock().outcome.state()
    }

    /// Attempt to cancel the task
    ///
    /// Fails if the task already reached a terminal state. A task that has
    /// not started is always cancelled and will never run. A running task is
    /// cancelled only when `interrupt` is true; its work is signalled through
    /// its [`Checkpoint`] and whatever it produces afterwards is discarded.
    ///
    /// Never blocks on the execution unit.
    pub fn cancel(&self, interrupt: bool) -> bool {
        let cancelled = self.shared.cancel(interrupt);
        if cancelled {
            tracing::info!(
                future_id = %self.shared.id,
                interrupt = interrupt,
                "Future cancelled"
            );
        }
        cancelled
    }

    /// True if the task was cancelled before it completed normally
    pub fn is_cancelled(&self) -> bool {
        self.state() == FutureState::Cancelled
    }

    /// True once the task succeeded, failed or was cancelled
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// True once the execution unit began running the work
    pub fn is_started(&self) -> bool {
        self.shared.inner.lock().started_at.is_some()
    }

    pub fn status(&self) -> FutureStatus {
        let inner = self.shared.inner.lock();
        FutureStatus {
            id: self.shared.id,
            state: inner.outcome.state(),
            started: inner.started_at.is_some(),
            launched_at: self.shared.launched_at,
            started_at: inner.started_at,
            finished_at: inner.finished_at,
        }
    }
}

impl<T: Clone> Future<T> {
    /// Wait if necessary for the task to settle, then return its outcome
    ///
    /// Once settled the same outcome is returned on every call; the work is
    /// never re-run.
    pub fn get(&self) -> Result<T, FutureError> {
        let mut inner = self.shared.inner.lock();
        loop {
            if let Some(outcome) = inner.outcome.settled() {
                return outcome;
            }
            self.shared.settled.wait(&mut inner);
        }
    }

    /// Wait at most `timeout` for the task to settle
    ///
    /// On expiry returns [`FutureError::Timeout`] and leaves the task
    /// untouched, so a later call can still observe the real outcome.
    pub fn get_with_timeout(&self, timeout: Duration) -> Result<T, FutureError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.get();
        };

        let mut inner = self.shared.inner.lock();
        loop {
            if let Some(outcome) = inner.outcome.settled() {
                return outcome;
            }
            if self.shared.settled.wait_until(&mut inner, deadline).timed_out() {
                if let Some(outcome) = inner.outcome.settled() {
                    return outcome;
                }
                tracing::trace!(
                    future_id = %self.shared.id,
                    timeout_ms = saturating_millis(timeout),
                    "Timed out waiting for future"
                );
                return Err(TimeoutError::new(TIMEOUT_MESSAGE).into());
            }
        }
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
