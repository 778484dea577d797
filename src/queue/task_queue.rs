//! # Ordered, deduplicating, thread-safe task buffer.
//!
//! A single [`parking_lot::Mutex`] guards the sequence and the membership set
//! together, so `push` and `pop` are atomic with respect to each other.
//!
//! ## Backpressure
//! A scheduled task whose previous firing is still pending is simply rejected
//! on the next firing. Pending instances of one task are bounded to one as a
//! side effect of dedup; there is no other flow control.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::Subscription;
use crate::error::MetricsError;
use crate::metrics::{Collector, Counter, Gauge, Opts, Registry};
use crate::tasks::{TaskRef, task_id};

/// Default cadence of the subscription poll fallback.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

struct Inner<C> {
    tasks: VecDeque<TaskRef<C>>,
    members: HashSet<usize>,
}

/// FIFO queue of pending tasks, deduplicated by instance identity.
///
/// ## Example
/// ```rust
/// use probevisor::{TaskFn, TaskQueue, TaskRef, TaskContext};
///
/// let q: TaskQueue<()> = TaskQueue::new();
/// let t1: TaskRef<()> = TaskFn::arc("t1", |_: TaskContext| async { Ok(()) });
///
/// assert!(q.push(t1.clone()));
/// assert!(!q.push(t1.clone()));          // same instance still pending
/// assert_eq!(q.len(), 1);
/// assert_eq!(q.rejected(), 1);
///
/// assert!(q.pop().is_some());
/// assert!(q.push(t1));                   // membership cleared on pop
/// ```
pub struct TaskQueue<C> {
    inner: Mutex<Inner<C>>,
    notify: Notify,
    length: Arc<Gauge>,
    rejected: Arc<Counter>,
}

impl<C> TaskQueue<C> {
    /// Creates an empty queue with unregistered metrics.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                tasks: VecDeque::new(),
                members: HashSet::new(),
            }),
            notify: Notify::new(),
            length: Gauge::new(
                Opts::new("length")
                    .namespace("probevisor")
                    .subsystem("queue")
                    .help("Tasks waiting to be dispatched"),
            ),
            rejected: Counter::new(
                Opts::new("rejected_total")
                    .namespace("probevisor")
                    .subsystem("queue")
                    .help("Pushes rejected because the task was already pending"),
            ),
        }
    }

    /// Appends `task` unless the same instance is already pending.
    ///
    /// Returns `true` if the task was accepted.
    pub fn push(&self, task: TaskRef<C>) -> bool {
        self.push_all([task]) == 1
    }

    /// Appends each task in order under one lock; returns how many were accepted.
    pub fn push_all<I>(&self, tasks: I) -> usize
    where
        I: IntoIterator<Item = TaskRef<C>>,
    {
        let accepted = {
            let mut inner = self.inner.lock();
            let mut accepted = 0;
            for task in tasks {
                if !inner.members.insert(task_id(&task)) {
                    self.rejected.inc();
                    continue;
                }
                inner.tasks.push_back(task);
                accepted += 1;
            }
            self.length.set(inner.tasks.len() as f64);
            accepted
        };

        if accepted > 0 {
            self.notify.notify_waiters();
        }
        accepted
    }

    /// Removes and returns the head, or `None` if nothing is pending.
    pub fn pop(&self) -> Option<TaskRef<C>> {
        let mut inner = self.inner.lock();
        let task = inner.tasks.pop_front()?;
        inner.members.remove(&task_id(&task));
        self.length.set(inner.tasks.len() as f64);
        Some(task)
    }

    /// Current pending count. For observability, not control flow.
    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if this exact instance is pending.
    pub fn contains(&self, task: &TaskRef<C>) -> bool {
        self.inner.lock().members.contains(&task_id(task))
    }

    /// Total pushes rejected by dedup since creation.
    pub fn rejected(&self) -> u64 {
        self.rejected.get()
    }

    /// Registers the `queue_length` gauge and `queue_rejected_total` counter.
    pub fn register_metrics(&self, registry: &Registry) -> Result<(), MetricsError> {
        registry.register_all(self.collectors())
    }

    /// Length gauge and rejection counter.
    pub(crate) fn collectors(&self) -> [Arc<dyn Collector>; 2] {
        [self.length.clone(), self.rejected.clone()]
    }

    /// Opens a continuous feed over this queue.
    ///
    /// The feed wakes on pushes and additionally polls every `poll_interval`.
    /// Several subscriptions on one queue compete for items.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(self: &Arc<Self>, poll_interval: Duration) -> Subscription<C> {
        Subscription::new(Arc::clone(self), poll_interval)
    }

    pub(super) fn notify(&self) -> &Notify {
        &self.notify
    }
}

impl<C> Default for TaskQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> std::fmt::Debug for TaskQueue<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        let names: Vec<&str> = inner.tasks.iter().map(|t| t.name()).collect();
        f.debug_struct("TaskQueue").field("pending", &names).finish()
    }
}
