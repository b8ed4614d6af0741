//! Task group metrics

use core::fmt;
use metrics::{Counter, Gauge};

/// Task group metrics, labelled by group name.
#[derive(Clone, Debug)]
pub(crate) struct TaskGroupMetrics {
    /// Number of spawned tasks
    pub(crate) spawned_tasks_total: Counter,
    /// Number of finished tasks, including panicked ones
    pub(crate) finished_tasks_total: Counter,
    /// Number of tasks that panicked
    pub(crate) panicked_tasks_total: Counter,
    /// Number of tasks still running when a drain gave up
    pub(crate) abandoned_tasks_total: Counter,
    /// Tasks currently in flight
    pub(crate) in_flight: Gauge,
}

impl TaskGroupMetrics {
    pub(crate) fn new(group: &'static str) -> Self {
        Self {
            spawned_tasks_total: metrics::counter!("tasks.spawned_total", "group" => group),
            finished_tasks_total: metrics::counter!("tasks.finished_total", "group" => group),
            panicked_tasks_total: metrics::counter!("tasks.panicked_total", "group" => group),
            abandoned_tasks_total: metrics::counter!("tasks.abandoned_total", "group" => group),
            in_flight: metrics::gauge!("tasks.in_flight", "group" => group),
        }
    }

    /// Increments the counter for spawned tasks.
    pub(crate) fn inc_spawned(&self) {
        self.spawned_tasks_total.increment(1);
        self.in_flight.increment(1.0);
    }
}

/// Helper type for increasing counters even if a task fails
pub(crate) struct IncCounterOnDrop {
    counter: Counter,
    in_flight: Gauge,
}

impl fmt::Debug for IncCounterOnDrop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IncCounterOnDrop").finish()
    }
}

impl IncCounterOnDrop {
    /// Creates a guard that records a finished task when dropped.
    pub(crate) fn new(metrics: &TaskGroupMetrics) -> Self {
        Self {
            counter: metrics.finished_tasks_total.clone(),
            in_flight: metrics.in_flight.clone(),
        }
    }
}

impl Drop for IncCounterOnDrop {
    /// Increment the counter when the instance is dropped.
    fn drop(&mut self) {
        self.counter.increment(1);
        self.in_flight.decrement(1.0);
    }
}
