//! # Task abstraction and execution context.
//!
//! This module defines the [`Task`] trait (async, deadline-bounded) and the
//! [`TaskContext`] handed to every run. The common handle type is [`TaskRef`],
//! an `Arc<dyn Task<C>>` suitable for sharing between the queue, the scheduler
//! and the engine.
//!
//! `C` is the service-handle bundle of the engine (HTTP client, target URL,
//! storage backend...). The engine treats it as opaque and passes the same
//! `&C` to every run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::metrics::Histogram;
use crate::tasks::Registration;

/// Shared handle to a task.
///
/// Queue membership is keyed by the allocation behind this `Arc`: two
/// distinct instances with identical content are independent entries.
pub type TaskRef<C> = Arc<dyn Task<C>>;

/// Identity of a task instance (its allocation address).
pub(crate) fn task_id<C>(task: &TaskRef<C>) -> usize {
    Arc::as_ptr(task) as *const () as usize
}

/// # Executable unit run by the engine.
///
/// A `Task` has a stable [`name`](Task::name), an async [`run`](Task::run)
/// that receives a [`TaskContext`] and the engine's service handles, and a
/// static [`registration`](Task::registration) (schedule + collectors).
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use probevisor::{Task, TaskContext, TaskError, Registration};
///
/// struct Ping;
///
/// #[async_trait]
/// impl Task<String> for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     async fn run(&self, ctx: &TaskContext, target: &String) -> Result<(), TaskError> {
///         if ctx.is_cancelled() {
///             return Err(TaskError::Canceled);
///         }
///         let _ = target; // talk to the target...
///         Ok(())
///     }
///
///     fn registration(&self) -> Registration {
///         Registration::new("*/5 * * * *")
///     }
/// }
/// ```
#[async_trait]
pub trait Task<C>: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Executes the task once.
    ///
    /// Implementations must honor `ctx`: once it is cancelled (deadline hit or
    /// root shutdown) they should clean up and return promptly, typically with
    /// [`TaskError::Canceled`]. Any `Err` marks this execution as failed.
    async fn run(&self, ctx: &TaskContext, services: &C) -> Result<(), TaskError>;

    /// Static schedule and collectors. Must return the same value on every call.
    fn registration(&self) -> Registration {
        Registration::default()
    }

    /// Time-to-first-byte histogram, if the task records one.
    fn latency_hist(&self) -> Option<Arc<Histogram>> {
        None
    }

    /// Total fetch-time histogram, if the task records one.
    fn fetch_hist(&self) -> Option<Arc<Histogram>> {
        None
    }
}

/// Cancellation token plus the deadline of one execution.
///
/// The engine derives a fresh context per run from the root token passed to
/// [`Engine::start`](crate::Engine::start). The context is cancelled when the
/// deadline passes or the root token is cancelled, whichever comes first.
#[derive(Clone, Debug)]
pub struct TaskContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl TaskContext {
    /// Context without a deadline.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Context that the owner promises to cancel at `deadline`.
    pub fn with_deadline(token: CancellationToken, deadline: Instant) -> Self {
        Self {
            token,
            deadline: Some(deadline),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` once the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time left until the deadline (`None` if unbounded).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Child context: cancelled with this one, may be cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn context_expires_at_deadline() {
        let ctx = TaskContext::with_deadline(
            CancellationToken::new(),
            Instant::now() + Duration::from_secs(10),
        );
        assert!(!ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn child_cancellation_does_not_reach_parent() {
        let parent = TaskContext::new(CancellationToken::new());
        let child = parent.child();
        child.token().cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let child = parent.child();
        parent.token().cancel();
        assert!(child.is_cancelled());
    }
}
