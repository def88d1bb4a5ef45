//! Error types for ouroboros-future

use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error accepted from fallible work
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) const CANCELLED_MESSAGE: &str = "task is cancelled by user";
pub(crate) const TIMEOUT_MESSAGE: &str = "Time Out, result not found";

/// The task was aborted by the caller before producing a result
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at {timestamp}, {message}")]
pub struct CancellationError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl CancellationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A bounded wait expired before the task produced a result.
///
/// The task itself is unaffected; retrieving again is always allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at {timestamp}, {message}")]
pub struct TimeoutError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl TimeoutError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The invoked work terminated abnormally (returned an error or panicked)
#[derive(Debug, Clone, Error)]
#[error("at {timestamp}, {message}")]
pub struct ExecutionError {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ExecutionError {
    /// Create an execution error without an underlying cause
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            source: None,
        }
    }

    /// Wrap an error returned by the work
    pub fn from_source(err: BoxError) -> Self {
        Self {
            message: err.to_string(),
            timestamp: Utc::now(),
            source: Some(Arc::from(err)),
        }
    }

    /// Build from a panic payload captured by `catch_unwind`
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(format!("work panicked: {}", detail))
    }

    /// The error returned by the work, if any
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

/// Returned by [`Checkpoint`](crate::Checkpoint) once cancellation has been requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("execution interrupted by cancellation")]
pub struct Interrupted;

/// Error outcome of `Future::get` / `Future::get_with_timeout`
#[derive(Debug, Clone, Error)]
pub enum FutureError {
    #[error(transparent)]
    Cancelled(#[from] CancellationError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl FutureError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FutureError::Cancelled(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FutureError::Timeout(_))
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, FutureError::Execution(_))
    }

    pub fn message(&self) -> &str {
        match self {
            FutureError::Cancelled(e) => &e.message,
            FutureError::Timeout(e) => &e.message,
            FutureError::Execution(e) => &e.message,
        }
    }

    /// When the error was recorded
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            FutureError::Cancelled(e) => e.timestamp,
            FutureError::Timeout(e) => e.timestamp,
            FutureError::Execution(e) => e.timestamp,
        }
    }
}
