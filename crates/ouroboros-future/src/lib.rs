//! Thread-backed futures for ouroboros
//!
//! Launch a closure on its own execution unit and get a [`Future`] back
//! immediately. The future can be waited on, waited on with a deadline, or
//! cancelled.
//!
//! # Features
//! - One dedicated thread per launched task, no pooling
//! - Single tagged state (Pending, Running, Succeeded, Cancelled, Failed)
//!   guarded by one lock, terminal states are sticky
//! - Timeouts bound the caller's wait only, never the task
//! - Cooperative cancellation through [`Checkpoint`], or at any `.await`
//!   for work started with [`Launcher::launch_async`]
//! - Panics and errors in the work surface as a Failed future
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! let future = ouroboros_future::launch(|| {
//!     std::thread::sleep(Duration::from_secs(1));
//!     ("gouri".to_string(), 100)
//! });
//!
//! assert!(future.get_with_timeout(Duration::from_millis(100)).unwrap_err().is_timeout());
//! assert_eq!(future.get().unwrap(), ("gouri".to_string(), 100));
//! ```

pub mod cancel;
pub mod error;
pub mod future;
pub mod launcher;
pub mod state;

pub use cancel::Checkpoint;
pub use error::{
    BoxError, CancellationError, ExecutionError, FutureError, Interrupted, TimeoutError,
};
pub use future::{Future, FutureId};
pub use launcher::{launch, launch_cooperative, Launcher, LauncherConfig};
pub use state::{FutureState, FutureStatus};

/// Result type alias for future retrieval
pub type Result<T> = std::result::Result<T, FutureError>;
