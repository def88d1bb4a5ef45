//! Launcher: spawns one execution unit per task and hands back its Future

use once_cell::sync::Lazy;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::future::Shared;
use crate::{BoxError, Checkpoint, ExecutionError, Future, Interrupted};

static DEFAULT_LAUNCHER: Lazy<Launcher> = Lazy::new(Launcher::default);

/// Launcher configuration
#[derive(Clone)]
pub struct LauncherConfig {
    /// Prefix for execution unit thread names (`<prefix>-<future id>`)
    pub name_prefix: String,
    /// Stack size for execution unit threads (None = platform default)
    pub stack_size: Option<usize>,
}

impl LauncherConfig {
    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl std::fmt::Debug for LauncherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LauncherConfig")
            .field("name_prefix", &self.name_prefix)
            .field("stack_size", &self.stack_size)
            .finish()
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            name_prefix: "ouroboros-future".to_string(),
            stack_size: None,
        }
    }
}

/// Starts work on its own thread and returns a [`Future`] immediately
///
/// There is no pool: every launch gets a dedicated execution unit.
#[derive(Debug, Clone, Default)]
pub struct Launcher {
    config: LauncherConfig,
}

impl Launcher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Launch infallible work; a panic inside it surfaces as a failed future
    pub fn launch<F, T>(&self, work: F) -> Future<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.spawn_unit(move |_| Ok(work()))
    }

    /// Launch fallible work; an `Err` surfaces as a failed future
    pub fn try_launch<F, T, E>(&self, work: F) -> Future<T>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        self.spawn_unit(move |_| work().map_err(Into::into))
    }

    /// Launch long-running work that checks for cancellation itself
    ///
    /// Use `cx.checkpoint()?` between steps and `cx.sleep(..)?` instead of
    /// `thread::sleep` so `cancel(true)` takes effect promptly.
    pub fn launch_cooperative<F, T, E>(&self, work: F) -> Future<T>
    where
        F: FnOnce(&Checkpoint) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        self.spawn_unit(move |cx| work(cx).map_err(Into::into))
    }

    /// Launch async work on a current-thread Tokio runtime owned by the
    /// execution unit
    ///
    /// Cancellation interrupts the work at its next `.await`.
    pub fn launch_async<F, Fut, T, E>(&self, work: F) -> Future<T>
    where
        F: FnOnce(Checkpoint) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T, E>> + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        self.spawn_unit(move |cx| -> Result<T, BoxError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()?;
            let cx = cx.clone();

            runtime.block_on(async move {
                let watcher = cx.clone();
                tokio::select! {
                    biased;
                    _ = watcher.cancelled() => Err(Interrupted.into()),
                    result = work(cx) => result.map_err(Into::into),
                }
            })
        })
    }

    fn spawn_unit<W, T>(&self, work: W) -> Future<T>
    where
        W: FnOnce(&Checkpoint) -> Result<T, BoxError> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::new(Shared::new());
        let id = shared.id();

        // std panics on thread names with interior NUL bytes
        if self.config.name_prefix.contains('\0') {
            fail_spawn(&shared, "thread name prefix contains a NUL byte");
            return Future::from_shared(shared);
        }

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.config.name_prefix, id));
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let unit = Arc::clone(&shared);
        if let Err(e) = builder.spawn(move || run_unit(&unit, work)) {
            fail_spawn(&shared, e);
        }

        Future::from_shared(shared)
    }
}

/// Pending -> Failed when no execution unit could be started
fn fail_spawn<T>(shared: &Shared<T>, reason: impl std::fmt::Display) {
    tracing::error!(future_id = %shared.id(), error = %reason, "Failed to spawn execution unit");
    shared.complete(Err(ExecutionError::new(format!(
        "failed to spawn execution unit: {}",
        reason
    ))));
}

/// Body of an execution unit
fn run_unit<W, T>(shared: &Shared<T>, work: W)
where
    W: FnOnce(&Checkpoint) -> Result<T, BoxError>,
{
    let id = shared.id();

    if !shared.begin() {
        tracing::debug!(future_id = %id, "Future cancelled before start, work skipped");
        return;
    }
    tracing::debug!(future_id = %id, "Execution unit started");

    let cx = shared.checkpoint();
    let result = match panic::catch_unwind(AssertUnwindSafe(|| work(&cx))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            if !cx.is_cancelled() {
                tracing::warn!(future_id = %id, error = %e, "Work failed");
            }
            Err(ExecutionError::from_source(e))
        }
        Err(payload) => {
            let err = ExecutionError::from_panic(payload);
            tracing::warn!(future_id = %id, error = %err.message, "Work panicked");
            Err(err)
        }
    };

    if shared.complete(result) {
        tracing::debug!(future_id = %id, "Execution unit finished");
    } else {
        tracing::trace!(future_id = %id, "Future cancelled while running, outcome discarded");
    }
}

/// Launch `work` on the default launcher
pub fn launch<F, T>(work: F) -> Future<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    DEFAULT_LAUNCHER.launch(work)
}

/// Launch cooperative `work` on the default launcher
pub fn launch_cooperative<F, T, E>(work: F) -> Future<T>
where
    F: FnOnce(&Checkpoint) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError>,
{
    DEFAULT_LAUNCHER.launch_cooperative(work)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FutureState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    fn wait_until_started<T>(future: &Future<T>) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !future.is_started() {
            assert!(Instant::now() < deadline, "execution unit never started");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_launcher_config_defaults() {
        let config = LauncherConfig::default();
        assert_eq!(config.name_prefix, "ouroboros-future");
        assert_eq!(config.stack_size, None);
    }

    #[test]
    fn test_launcher_config_custom() {
        let config = LauncherConfig::default()
            .with_name_prefix("report")
            .with_stack_size(256 * 1024);
        assert_eq!(config.name_prefix, "report");
        assert_eq!(config.stack_size, Some(256 * 1024));

        let launcher = Launcher::new(config);
        assert_eq!(launcher.config().name_prefix, "report");
    }

    #[test]
    fn test_thread_is_named_after_future() {
        let launcher = Launcher::new(LauncherConfig::default().with_name_prefix("named"));
        let future = launcher.launch(|| thread::current().name().map(str::to_string));

        let name = future.get().unwrap().unwrap();
        assert_eq!(name, format!("named-{}", future.id()));
    }

    #[test]
    fn test_launch_returns_before_work_finishes() {
        let (tx, rx) = mpsc::channel::<()>();
        let future = launch(move || {
            rx.recv().ok();
            "done"
        });

        assert!(!future.is_done());
        tx.send(()).unwrap();
        assert_eq!(future.get().unwrap(), "done");
    }

    #[test]
    fn test_try_launch_error_becomes_failed() {
        let future = Launcher::default().try_launch(|| -> Result<u32, std::io::Error> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing config"))
        });

        let err = future.get().unwrap_err();
        assert!(err.is_execution());
        assert_eq!(err.message(), "missing config");
        assert_eq!(future.state(), FutureState::Failed);
    }

    #[test]
    fn test_panic_becomes_failed() {
        let future: Future<u32> = launch(|| panic!("exploded"));

        let err = future.get().unwrap_err();
        assert!(err.is_execution());
        assert_eq!(err.message(), "work panicked: exploded");
        assert!(!future.is_cancelled());
    }

    #[test]
    fn test_work_runs_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let future = launch(move || counter.fetch_add(1, Ordering::SeqCst));

        for _ in 0..5 {
            assert_eq!(future.get().unwrap(), 0);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cooperative_work_stops_on_interrupt() {
        let steps = Arc::new(AtomicUsize::new(0));
        let counter = steps.clone();
        let future = launch_cooperative(move |cx| -> Result<u32, Interrupted> {
            for _ in 0..10_000 {
                cx.checkpoint()?;
                counter.fetch_add(1, Ordering::SeqCst);
                cx.sleep(Duration::from_millis(5))?;
            }
            Ok(0)
        });

        wait_until_started(&future);
        assert!(future.cancel(true));
        assert!(future.get().unwrap_err().is_cancelled());

        // Give the unit time to observe the signal, then make sure it stopped
        thread::sleep(Duration::from_millis(50));
        let seen = steps.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(steps.load(Ordering::SeqCst), seen);
        assert!(future.is_cancelled());
    }

    #[test]
    fn test_cancel_before_start_skips_work() {
        let shared = Arc::new(Shared::<usize>::new());
        let future = Future::from_shared(shared.clone());
        assert!(future.cancel(false));

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        run_unit(&shared, move |_| Ok(counter.fetch_add(1, Ordering::SeqCst)));

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!future.is_started());
        assert!(future.get().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_async_work_succeeds() {
        let future = Launcher::default().launch_async(|_cx| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, Interrupted>(("gouri".to_string(), 100))
        });

        assert_eq!(future.get().unwrap(), ("gouri".to_string(), 100));
    }

    #[test]
    fn test_async_work_interrupted_at_await() {
        let future = Launcher::default().launch_async(|_cx| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, Interrupted>(1u8)
        });

        wait_until_started(&future);
        let start = Instant::now();
        assert!(future.cancel(true));
        assert!(future.get().unwrap_err().is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_async_work_observes_cancelled() {
        let future = Launcher::default().launch_async(|cx| async move {
            tokio::select! {
                _ = cx.cancelled() => Err(Interrupted),
                _ = tokio::time::sleep(Duration::from_secs(30)) => Ok(1u8),
            }
        });

        wait_until_started(&future);
        let start = Instant::now();
        assert!(future.cancel(true));
        assert!(future.get().unwrap_err().is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_nul_in_name_prefix_fails_future() {
        let launcher = Launcher::new(LauncherConfig::default().with_name_prefix("bad\0name"));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| launcher.launch(|| 1u32)));
        let future = outcome.expect("launch must not panic");

        assert_eq!(future.state(), FutureState::Failed);
        let err = future.get().unwrap_err();
        assert!(err.is_execution());
        assert!(err.message().starts_with("failed to spawn execution unit"));
        assert!(!future.is_started());
        assert!(!future.cancel(true));
    }

    #[test]
    fn test_refused_spawn_fails_future() {
        let launcher = Launcher::new(LauncherConfig::default().with_stack_size(usize::MAX / 2));
        let future = launcher.launch(|| 1u32);

        assert_eq!(future.state(), FutureState::Failed);
        let err = future.get().unwrap_err();
        assert!(err.is_execution());
        assert!(err.message().starts_with("failed to spawn execution unit"));
        assert!(!future.cancel(true));
        assert!(future.is_done());
    }
}
