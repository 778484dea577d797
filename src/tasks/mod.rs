//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`Task`] - trait for implementing deadline-bounded async tasks
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task<C>>`)
//! - [`TaskContext`] - cancellation token + deadline of one run
//! - [`Registration`] - schedule and collectors declared by a task
//! - [`TaskFn`] - function-backed task implementation
//! - [`Terminal`] - sentinel that stops its engine
//! - [`Repeat`] - self-re-enqueuing task over a fixed list

mod registration;
mod repeat;
mod task;
mod task_fn;
mod terminal;

pub use registration::Registration;
pub use repeat::Repeat;
pub use task::{Task, TaskContext, TaskRef};
pub(crate) use task::task_id;
pub use task_fn::TaskFn;
pub use terminal::Terminal;
