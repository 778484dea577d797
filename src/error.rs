//! Error types used by the probevisor engine and tasks.
//!
//! This module defines the error enums of the crate:
//!
//! - [`RuntimeError`]: errors raised while wiring or driving the engine itself.
//! - [`TaskError`]: errors raised by individual task executions.
//! - [`MetricsError`]: errors raised by the metrics [`Registry`](crate::Registry).
//! - [`TaskFailure`]: the item delivered on the engine's error stream.
//!
//! Error enums provide `as_label` for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the engine runtime.
///
/// These represent failures in the orchestration layer, never in a single task run.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// [`Engine::start`](crate::Engine::start) was called on an engine that already ran.
    #[error("engine already started")]
    AlreadyStarted,

    /// A task carried a schedule expression that does not parse as cron.
    #[error("task {task:?}: invalid schedule {expr:?}: {reason}")]
    InvalidSchedule {
        /// Name of the offending task.
        task: String,
        /// The expression as supplied by the task registration.
        expr: String,
        /// Parser message.
        reason: String,
    },

    /// Collector registration failed while attaching a task.
    #[error(transparent)]
    Metrics(#[from] MetricsError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use probevisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::AlreadyStarted.as_label(), "runtime_already_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::InvalidSchedule { .. } => "runtime_invalid_schedule",
            RuntimeError::Metrics(_) => "runtime_metrics",
        }
    }
}

/// # Errors produced by task execution.
///
/// Any `Err` returned from [`Task::run`](crate::Task::run) marks that execution
/// as failed. The engine never retries; the next attempt only happens when the
/// schedule fires again or a repeat construct re-enqueues the task.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task did not return within its deadline plus the cancel grace.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The execution deadline that was exceeded.
        timeout: Duration,
    },

    /// Task observed its context cancelled (deadline hit or root shutdown).
    #[error("context cancelled")]
    Canceled,

    /// Probe failed: the service answered, but not the way it should.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task could not run at all (local setup, bad input).
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`TaskError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        TaskError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use probevisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Canceled => "task_canceled",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Fatal { .. } => "task_fatal",
        }
    }
}

/// # Errors produced by the metrics registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricsError {
    /// A collector with this fully-qualified name is already registered.
    #[error("collector {name:?} already registered")]
    AlreadyRegistered {
        /// Fully-qualified collector name.
        name: String,
    },
}

impl MetricsError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            MetricsError::AlreadyRegistered { .. } => "metrics_already_registered",
        }
    }
}

/// One failed task execution, as delivered on the engine's error stream.
#[derive(Error, Debug)]
#[error("task {task:?}: {error}")]
pub struct TaskFailure {
    /// Name of the task that failed.
    pub task: String,
    /// What went wrong.
    #[source]
    pub error: TaskError,
}
