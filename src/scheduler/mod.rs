//! # Cron-to-queue bridge.
//!
//! - [`parse_schedule`] - cron expression → [`cron::Schedule`]
//! - [`Scheduler`] - one timer loop per scheduled task, each firing pushes the task
//!
//! ```text
//! Registration.schedule ──► parse_schedule ──► Scheduler entry
//!                                                  │ every firing
//!                                                  ▼
//!                                          TaskQueue::push(task)
//!                                   (rejected while the previous firing is pending)
//! ```

mod bridge;
mod expr;

pub use bridge::Scheduler;
pub(crate) use bridge::schedule_for;
pub use expr::{normalize, parse_schedule};
