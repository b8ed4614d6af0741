//! Tracked background tasks.
//!
//! A [`TaskGroup`] spawns detached tasks onto the ambient tokio runtime and
//! keeps count of the ones still running, so that owners can wait for
//! outstanding work with a bounded grace period at shutdown.
//!
//! Tasks are not tied to the future that spawned them: dropping or cancelling
//! the caller leaves its spawned tasks running.

mod metrics;

use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::Duration,
};

use futures_util::FutureExt;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, warn};

use crate::metrics::{IncCounterOnDrop, TaskGroupMetrics};

/// Default grace period for [`TaskGroup::drain`].
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Error returned when a drain gives up before all tasks finished.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DrainError {
    /// The grace period elapsed with tasks still running.
    #[error("{remaining} task(s) in group `{group}` still running after {timeout:?}")]
    Timeout {
        /// Name of the group being drained.
        group: &'static str,
        /// Tasks still running when the grace period elapsed.
        remaining: usize,
        /// The grace period that elapsed.
        timeout: Duration,
    },
}

/// A named group of detached, tracked tasks.
///
/// Cloning yields another handle to the same group.
#[derive(Clone, Debug)]
pub struct TaskGroup {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    name: &'static str,
    /// Number of tasks spawned and not yet finished.
    active: watch::Sender<usize>,
    metrics: TaskGroupMetrics,
}

/// Decrements the active count when the task completes, panics or is dropped
/// by a shutting down runtime.
struct ActiveGuard(Arc<Inner>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.active.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl TaskGroup {
    /// Create an empty group.
    pub fn new(name: &'static str) -> Self {
        let (active, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                name,
                active,
                metrics: TaskGroupMetrics::new(name),
            }),
        }
    }

    /// Name of the group, used in logs and metric labels.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Number of tasks currently running.
    pub fn active(&self) -> usize {
        *self.inner.active.borrow()
    }

    /// Spawn a detached task tracked by this group.
    ///
    /// Must be called from within a tokio runtime. Panics inside the task are
    /// caught and logged; they do not affect other tasks in the group.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.active.send_modify(|n| *n += 1);
        self.inner.metrics.inc_spawned();

        let guard = ActiveGuard(self.inner.clone());
        let finished = IncCounterOnDrop::new(&self.inner.metrics);
        let panicked = self.inner.metrics.panicked_tasks_total.clone();
        let group = self.inner.name;

        tokio::spawn(async move {
            let _guard = guard;
            let _finished = finished;
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                panicked.increment(1);
                error!(group, panic = panic_message(&*panic), "task panicked");
            }
        })
    }

    /// Wait for every task in the group to finish, giving up after `timeout`.
    ///
    /// Tasks still running when the grace period elapses keep running; the
    /// error reports how many were left behind.
    pub async fn drain(&self, timeout: Duration) -> Result<(), DrainError> {
        let mut rx = self.inner.active.subscribe();
        let pending = self.active();
        if pending == 0 {
            return Ok(());
        }

        debug!(group = self.inner.name, pending, ?timeout, "draining tasks");

        let drained =
            tokio::time::timeout(timeout, async { rx.wait_for(|n| *n == 0).await.is_ok() }).await;

        match drained {
            Ok(true) => {
                debug!(group = self.inner.name, "tasks drained");
                Ok(())
            }
            _ => {
                let remaining = self.active();
                self.inner
                    .metrics
                    .abandoned_tasks_total
                    .increment(remaining as u64);
                warn!(
                    group = self.inner.name,
                    remaining,
                    ?timeout,
                    "gave up waiting for tasks"
                );
                Err(DrainError::Timeout {
                    group: self.inner.name,
                    remaining,
                    timeout,
                })
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
