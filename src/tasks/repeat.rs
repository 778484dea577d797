//! # Repeat construct: a task that keeps a fixed task list cycling.
//!
//! ```text
//! run():
//!   until()? ── yes ──► enqueue fresh Terminal ──► Ok
//!      │
//!      no
//!      ▼
//!   enqueue task[0..n] (dedup applies) ──► enqueue self ──► Ok
//! ```
//!
//! The predicate is evaluated at the start of every run, so a true predicate
//! lets the tasks enqueued by the previous run drain first and then stops the
//! engine. A `Repeat` sits in the queue it feeds, so it holds a [`WeakHandle`]
//! and a weak pointer to itself: once the engine is dropped, the queue and
//! everything pending in it are freed. A run after that point does nothing.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::core::{EngineHandle, WeakHandle};
use crate::error::TaskError;
use crate::tasks::{Task, TaskContext, TaskRef};

type Until = Box<dyn Fn() -> bool + Send + Sync>;

/// Self-re-enqueuing task over a fixed list.
pub struct Repeat<C> {
    handle: WeakHandle<C>,
    tasks: Vec<TaskRef<C>>,
    until: Until,
    me: Weak<Repeat<C>>,
}

impl<C: Send + Sync + 'static> Repeat<C> {
    /// Creates the construct. `until` is re-evaluated on every run.
    pub fn new<F>(handle: &EngineHandle<C>, tasks: Vec<TaskRef<C>>, until: F) -> Arc<Self>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Arc::new_cyclic(|me| Self {
            handle: handle.downgrade(),
            tasks,
            until: Box::new(until),
            me: me.clone(),
        })
    }

    /// Creates a construct whose predicate is always false.
    pub fn forever(handle: &EngineHandle<C>, tasks: Vec<TaskRef<C>>) -> Arc<Self> {
        Self::new(handle, tasks, || false)
    }

    /// Wrapped tasks, in enqueue order.
    pub fn tasks(&self) -> &[TaskRef<C>] {
        &self.tasks
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Task<C> for Repeat<C> {
    fn name(&self) -> &str {
        "repeat_task"
    }

    async fn run(&self, _ctx: &TaskContext, _services: &C) -> Result<(), TaskError> {
        let Some(handle) = self.handle.upgrade() else {
            debug!("engine gone, repeat has nothing to feed");
            return Ok(());
        };

        if (self.until)() {
            info!(tasks = self.tasks.len(), "loop finished");
            handle.add_task(handle.terminal_task());
            return Ok(());
        }

        debug!(tasks = self.tasks.len(), "looping");
        for task in &self.tasks {
            handle.add_task(Arc::clone(task));
        }
        if let Some(me) = self.me.upgrade() {
            handle.add_task(me);
        }
        Ok(())
    }
}

impl<C: 'static> fmt::Debug for Repeat<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tasks.iter().map(|t| t.name()).collect();
        f.debug_struct("Repeat").field("tasks", &names).finish()
    }
}
