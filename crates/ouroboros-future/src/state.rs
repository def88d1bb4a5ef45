//! Future state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::FutureId;

/// Future state in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FutureState {
    /// Execution unit has not begun running the work
    #[default]
    Pending,
    /// Work is being executed
    Running,
    /// Work returned normally, result available
    Succeeded,
    /// Cancelled by the caller
    Cancelled,
    /// Work returned an error or panicked
    Failed,
}

impl FutureState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Cancelled | Self::Failed)
    }

    /// Check if the work is in progress
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Valid state transitions
    pub fn can_transition_to(&self, next: FutureState) -> bool {
        match (self, next) {
            // From PENDING
            (Self::Pending, Self::Running) => true,
            (Self::Pending, Self::Cancelled) => true,
            // Execution unit could not be spawned
            (Self::Pending, Self::Failed) => true,

            // From RUNNING
            (Self::Running, Self::Succeeded) => true,
            (Self::Running, Self::Failed) => true,
            (Self::Running, Self::Cancelled) => true,

            _ => false,
        }
    }
}

impl std::fmt::Display for FutureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a future, without its result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureStatus {
    pub id: FutureId,
    pub state: FutureState,
    /// True once the execution unit began running the work
    pub started: bool,
    pub launched_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl FutureStatus {
    /// Wall-clock time between start and terminal transition
    pub fn runtime_ms(&self) -> Option<u64> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        u64::try_from((finished - started).num_milliseconds()).ok()
    }
}
