//! # Runtime events emitted by the engine, its scheduler and its queue handle.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Queue events**: enqueue accepted/rejected, schedule firings
//! - **Execution events**: one task run (starting, stopped, failed, timeout)
//! - **Engine events**: shutdown requested, loop exited
//! - **Subscriber events**: overflow and panic of event subscribers
//!
//! The [`Event`] struct carries optional metadata (task name, reason, timing).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use probevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task("known_good")
//!     .with_reason("status 502")
//!     .with_elapsed(Duration::from_millis(840));
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task.as_deref(), Some("known_good"));
//! assert_eq!(ev.elapsed_ms, Some(840));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Queue events ===
    /// Task accepted by the queue through the engine handle.
    ///
    /// Sets: `task`
    TaskEnqueued,

    /// Push rejected because the same instance is still pending.
    ///
    /// Sets: `task`
    TaskRejected,

    /// A cron entry fired. `reason` is `"queued"` or `"pending"` (dedup hit).
    ///
    /// Sets: `task`, `reason`
    ScheduleFired,

    // === Execution events ===
    /// Consumer loop dequeued a task and is about to run it.
    ///
    /// Sets: `task`, `timeout_ms` (execution deadline)
    TaskStarting,

    /// Task returned `Ok(())`.
    ///
    /// Sets: `task`, `elapsed_ms`
    TaskStopped,

    /// Task returned an error (including timeout and cancellation).
    ///
    /// Sets: `task`, `reason`, `elapsed_ms`
    TaskFailed,

    /// Execution deadline passed; the task context was cancelled.
    /// Always followed by `TaskStopped` or `TaskFailed` for the same run.
    ///
    /// Sets: `task`, `timeout_ms`
    TimeoutHit,

    // === Engine events ===
    /// Shutdown observed by the consumer loop (terminal task, `stop()`, or root cancellation).
    ShutdownRequested,

    /// Consumer loop exited; the error stream is closed.
    EngineStopped,

    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic message)
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the task (or subscriber), if applicable.
    pub task: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Execution deadline in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Run duration in milliseconds.
    pub elapsed_ms: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            reason: None,
            timeout_ms: None,
            elapsed_ms: None,
        }
    }

    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(millis(d));
        self
    }

    #[inline]
    pub fn with_elapsed(mut self, d: Duration) -> Self {
        self.elapsed_ms = Some(millis(d));
        self
    }

    /// Run duration, if recorded.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed_ms.map(Duration::from_millis)
    }

    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}
