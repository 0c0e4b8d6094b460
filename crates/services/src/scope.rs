use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A disposal list for the timers and background tasks owned by one UI
/// state (auto-advance, countdowns, cache warming).
///
/// Every handle is aborted exactly once when the scope is cancelled, and
/// `Drop` cancels whatever is left, so a superseded state can never fire a
/// stale callback into the session.
#[derive(Debug, Default)]
pub struct TaskScope {
    handles: Vec<JoinHandle<()>>,
}

impl TaskScope {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task owned by this scope.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push(tokio::spawn(future));
    }

    /// Spawn a task that runs after `delay`, unless the scope is cancelled
    /// first.
    pub fn spawn_after<F>(&mut self, delay: Duration, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.push(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            future.await;
        }));
    }

    /// Number of tasks still tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Abort every tracked task. Idempotent: aborted handles are dropped,
    /// so a second call finds nothing to cancel.
    pub fn cancel_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
