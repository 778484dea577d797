//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(TaskContext) -> Fut`, producing a fresh
//! future per run. It ignores the engine's service handles, so it fits any
//! engine regardless of `C`.
//!
//! ## Example
//! ```rust
//! use probevisor::{TaskFn, TaskRef, TaskContext, TaskError};
//!
//! let t: TaskRef<()> = TaskFn::arc("tick", |ctx: TaskContext| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     Ok(())
//! });
//! assert_eq!(t.name(), "tick");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::{Registration, Task, TaskContext};

/// Function-backed task implementation.
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    schedule: String,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task with no schedule.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            schedule: String::new(),
            f,
        }
    }

    /// Attaches a cron schedule.
    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = schedule.into();
        self
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<C, F, Fut> Task<C> for TaskFn<F>
where
    C: Send + Sync + 'static,
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &TaskContext, _services: &C) -> Result<(), TaskError> {
        (self.f)(ctx.clone()).await
    }

    fn registration(&self) -> Registration {
        Registration::new(self.schedule.clone())
    }
}
