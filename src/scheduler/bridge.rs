//! # Scheduler: recurring "enqueue this task" actions.
//!
//! Each scheduled task gets its own timer loop:
//!
//! ```text
//! loop {
//!   ├─► next = schedule.after(cursor)
//!   ├─► sleep until next (cancellable)
//!   ├─► queue.push(task) ── rejected? ──► counted by the queue, nothing else
//!   └─► cursor = max(next, now)
//! }
//! ```
//!
//! ## Rules
//! - Timer loops only ever call `push`; they never run tasks.
//! - A late wake-up (suspended host, busy runtime) fires once, not once per missed slot.
//! - `stop()` cancels every loop; a stopped scheduler cannot be restarted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::parse_schedule;
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::queue::TaskQueue;
use crate::tasks::TaskRef;

struct Entry<C> {
    task: TaskRef<C>,
    schedule: Schedule,
}

/// Periodic producer feeding one [`TaskQueue`].
pub struct Scheduler<C> {
    queue: Arc<TaskQueue<C>>,
    entries: Mutex<Vec<Arc<Entry<C>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    token: CancellationToken,
    bus: Option<Bus>,
}

impl<C: 'static> Scheduler<C> {
    pub fn new(queue: Arc<TaskQueue<C>>) -> Self {
        Self {
            queue,
            entries: Mutex::new(Vec::new()),
            workers: Mutex::new(Vec::new()),
            token: CancellationToken::new(),
            bus: None,
        }
    }

    /// Publishes `ScheduleFired` events on `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Adds a recurring push for `task` if its registration carries a schedule.
    ///
    /// Returns `Ok(false)` for unscheduled tasks. If the scheduler is already
    /// running, the new entry starts immediately.
    pub fn add(&self, task: TaskRef<C>) -> Result<bool, RuntimeError> {
        let reg = task.registration();
        if !reg.is_scheduled() {
            return Ok(false);
        }
        let schedule = schedule_for(task.name(), &reg.schedule)?;
        self.insert(task, schedule);
        Ok(true)
    }

    /// Adds an entry whose registration was already read and parsed.
    pub(crate) fn insert(&self, task: TaskRef<C>, schedule: Schedule) {
        let entry = Arc::new(Entry { task, schedule });
        self.entries.lock().push(Arc::clone(&entry));

        let mut workers = self.workers.lock();
        if !workers.is_empty() && !self.token.is_cancelled() {
            workers.push(self.spawn(entry));
        }
    }

    /// Spawns the timer loops. Calling it again is a no-op.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut workers = self.workers.lock();
        if !workers.is_empty() || self.token.is_cancelled() {
            return;
        }
        for entry in self.entries.lock().iter() {
            workers.push(self.spawn(Arc::clone(entry)));
        }
        info!(entries = workers.len(), "scheduler started");
    }

    /// Cancels every timer loop.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            self.token.cancel();
            debug!("scheduler stopped");
        }
    }

    /// `true` once `start()` spawned at least one loop and `stop()` was not called.
    pub fn is_running(&self) -> bool {
        !self.workers.lock().is_empty() && !self.token.is_cancelled()
    }

    /// Number of scheduled entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn(&self, entry: Arc<Entry<C>>) -> JoinHandle<()> {
        let queue = Arc::clone(&self.queue);
        let token = self.token.clone();
        let bus = self.bus.clone();
        tokio::spawn(fire_loop(entry, queue, token, bus))
    }
}

/// Parses `expr` for the task called `task`.
pub(crate) fn schedule_for(task: &str, expr: &str) -> Result<Schedule, RuntimeError> {
    parse_schedule(expr).map_err(|reason| RuntimeError::InvalidSchedule {
        task: task.to_string(),
        expr: expr.to_string(),
        reason,
    })
}

impl<C> Drop for Scheduler<C> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn fire_loop<C: 'static>(
    entry: Arc<Entry<C>>,
    queue: Arc<TaskQueue<C>>,
    token: CancellationToken,
    bus: Option<Bus>,
) {
    let name = entry.task.name().to_string();
    let mut cursor = Utc::now();

    loop {
        let Some(next) = entry.schedule.after(&cursor).next() else {
            debug!(task = %name, "schedule has no further firings");
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(wait) => {}
        }

        let accepted = queue.push(Arc::clone(&entry.task));
        if let Some(bus) = &bus {
            bus.publish(
                Event::new(EventKind::ScheduleFired)
                    .with_task(name.as_str())
                    .with_reason(if accepted { "queued" } else { "pending" }),
            );
        }
        cursor = next.max(Utc::now());
    }
}
