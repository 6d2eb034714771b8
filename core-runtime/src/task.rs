//! # Preemptive Task Management
//!
//! Some asynchronous operations are triggered by user actions and may be
//! superseded before they finish: preparing media for the current song,
//! looking for a standby, fetching the next FM batch. Letting the stale run
//! complete alongside the fresh one is a correctness bug, so each kind of
//! operation is bound to a named [`PreemptiveTaskSpec`] that keeps exactly one
//! live binding.
//!
//! Binding a new future aborts the previous binding immediately and does not
//! wait for it. Both `bind_*` methods can be called from any thread: the spec
//! keeps the runtime handle it was created on and always schedules there.
//!
//! ```rust
//! use core_runtime::task::TaskManager;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let manager = TaskManager::current().unwrap();
//! let spec = manager.get_or_create("playlist.set_current_model");
//!
//! let stale = spec.bind_coro(std::future::pending::<()>());
//! let fresh = spec.bind_coro(async { 42 });
//!
//! assert!(stale.is_cancelled());
//! assert_eq!(fresh.await.unwrap(), 42);
//! # }
//! ```

use crate::error::{Error, Result};
use crate::signal::panic_message;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error};

// ============================================================================
// Task Handle
// ============================================================================

/// Handle to one binding of a [`PreemptiveTaskSpec`].
///
/// Awaiting it yields the task output, [`Error::Cancelled`] when the binding
/// was superseded, or [`Error::TaskPanicked`].
pub struct TaskHandle<T> {
    name: Arc<str>,
    join: JoinHandle<Result<T>>,
    cancelled: Arc<AtomicBool>,
}

impl<T> TaskHandle<T> {
    /// `true` once the binding was aborted, even if the runtime has not
    /// observed the abort yet.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `true` once the task ran to completion or was torn down.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn abort(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.join.abort();
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let name = Arc::clone(&self.name);
        Pin::new(&mut self.join).poll(cx).map(|joined| match joined {
            Ok(output) => output,
            Err(err) if err.is_cancelled() => Err(Error::Cancelled(name.to_string())),
            Err(err) => Err(Error::TaskPanicked {
                task: name.to_string(),
                message: err.to_string(),
            }),
        })
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

// ============================================================================
// Preemptive Task Spec
// ============================================================================

struct Binding {
    abort: AbortHandle,
    cancelled: Arc<AtomicBool>,
}

/// A named slot holding at most one live task.
pub struct PreemptiveTaskSpec {
    name: Arc<str>,
    runtime: Handle,
    current: Mutex<Option<Binding>>,
    default_cb: AtomicBool,
}

impl PreemptiveTaskSpec {
    fn new(name: &str, runtime: Handle) -> Self {
        Self {
            name: Arc::from(name),
            runtime,
            current: Mutex::new(None),
            default_cb: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop logging panics of bound tasks. Callers that await the handle and
    /// inspect the error themselves use this to avoid double reporting.
    pub fn disable_default_cb(&self) {
        self.default_cb.store(false, Ordering::SeqCst);
    }

    /// Whether the current binding is still running.
    pub fn is_busy(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .map(|binding| !binding.abort.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the current binding, if any, and start `future`.
    pub fn bind_coro<F>(&self, future: F) -> TaskHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let name = Arc::clone(&self.name);
        self.bind(async move {
            AssertUnwindSafe(future)
                .catch_unwind()
                .await
                .map_err(|payload| Error::TaskPanicked {
                    task: name.to_string(),
                    message: panic_message(&payload),
                })
        })
    }

    /// Like [`bind_coro`](Self::bind_coro) but runs `func` on the blocking
    /// thread pool.
    ///
    /// Aborting the binding discards the result; the blocking call itself
    /// runs to completion because threads cannot be interrupted.
    pub fn bind_blocking_io<F, T>(&self, func: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let name = Arc::clone(&self.name);
        let blocking = self.runtime.spawn_blocking(func);
        self.bind(async move {
            blocking.await.map_err(|err| {
                if err.is_panic() {
                    Error::TaskPanicked {
                        task: name.to_string(),
                        message: panic_message(&err.into_panic()),
                    }
                } else {
                    Error::Cancelled(name.to_string())
                }
            })
        })
    }

    fn bind<F, T>(&self, wrapped: F) -> TaskHandle<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let name = Arc::clone(&self.name);
        let log_failures = self.default_cb.load(Ordering::SeqCst);
        let task_name = Arc::clone(&name);

        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            debug!(task = %name, "Cancelling previous binding");
            previous.cancelled.store(true, Ordering::SeqCst);
            previous.abort.abort();
        }

        let join = self.runtime.spawn(async move {
            let output = wrapped.await;
            if let Err(err) = &output {
                if log_failures {
                    error!(task = %task_name, error = %err, "Preemptive task failed");
                }
            }
            output
        });

        let cancelled = Arc::new(AtomicBool::new(false));
        *current = Some(Binding {
            abort: join.abort_handle(),
            cancelled: Arc::clone(&cancelled),
        });

        TaskHandle {
            name,
            join,
            cancelled,
        }
    }
}

impl fmt::Debug for PreemptiveTaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreemptiveTaskSpec")
            .field("name", &self.name)
            .field("busy", &self.is_busy())
            .finish()
    }
}

// ============================================================================
// Task Manager
// ============================================================================

/// Registry of task specs keyed by name.
pub struct TaskManager {
    runtime: Handle,
    specs: Mutex<HashMap<String, Arc<PreemptiveTaskSpec>>>,
}

impl TaskManager {
    /// Create a manager that schedules every task on `runtime`.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            specs: Mutex::new(HashMap::new()),
        }
    }

    /// Create a manager bound to the runtime of the calling context.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::NoRuntime(e.to_string()))
    }

    pub fn get_or_create(&self, name: &str) -> Arc<PreemptiveTaskSpec> {
        let mut specs = self.specs.lock();
        Arc::clone(
            specs
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(PreemptiveTaskSpec::new(name, self.runtime.clone()))),
        )
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }
}

impl fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskManager")
            .field("specs", &self.specs.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_or_create_returns_same_spec() {
        let manager = TaskManager::current().unwrap();
        let a = manager.get_or_create("prepare-media");
        let b = manager.get_or_create("prepare-media");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "prepare-media");
    }

    #[tokio::test]
    async fn test_rebind_cancels_previous() {
        let manager = TaskManager::current().unwrap();
        let spec = manager.get_or_create("rebind");

        let first = spec.bind_coro(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            1
        });
        let second = spec.bind_coro(async { 2 });

        assert!(first.is_cancelled() || first.is_finished());
        assert!(matches!(first.await, Err(Error::Cancelled(_))));
        assert_eq!(second.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_finished_binding_is_not_cancelled() {
        let manager = TaskManager::current().unwrap();
        let spec = manager.get_or_create("finished");
        let first = spec.bind_coro(async { "done" });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(first.is_finished());
        assert!(!spec.is_busy());

        let _second = spec.bind_coro(async {});
        assert!(first.is_cancelled() || first.is_finished());
        assert_eq!(first.await.unwrap(), "done");
    }

    #[tokio::test]
    async fn test_panic_is_reported_as_error() {
        let manager = TaskManager::current().unwrap();
        let spec = manager.get_or_create("panicky");
        spec.disable_default_cb();
        let handle = spec.bind_coro(async {
            panic!("provider exploded");
        });
        match handle.await {
            Err(Error::TaskPanicked { task, message }) => {
                assert_eq!(task, "panicky");
                assert!(message.contains("provider exploded"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bind_blocking_io() {
        let manager = TaskManager::current().unwrap();
        let spec = manager.get_or_create("fm-fetch-songs");
        let handle = spec.bind_blocking_io(|| {
            std::thread::sleep(Duration::from_millis(5));
            vec![1, 2, 3]
        });
        assert_eq!(handle.await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_blocking_binding_is_preempted_by_coro() {
        let manager = TaskManager::current().unwrap();
        let spec = manager.get_or_create("mixed");
        let slow = spec.bind_blocking_io(|| {
            std::thread::sleep(Duration::from_millis(50));
            "slow"
        });
        let fast = spec.bind_coro(async { "fast" });
        assert!(slow.is_cancelled());
        assert!(slow.await.is_err());
        assert_eq!(fast.await.unwrap(), "fast");
    }

    #[test]
    fn test_bind_from_foreign_thread() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let manager = Arc::new(TaskManager::new(runtime.handle().clone()));

        let m = Arc::clone(&manager);
        let handle = std::thread::spawn(move || {
            let spec = m.get_or_create("foreign");
            spec.bind_coro(async { 7 })
        })
        .join()
        .unwrap();

        assert_eq!(runtime.block_on(handle).unwrap(), 7);
    }
}
