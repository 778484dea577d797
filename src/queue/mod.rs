//! # Deduplicating task queue.
//!
//! - [`TaskQueue`] - FIFO buffer of pending [`TaskRef`](crate::TaskRef)s with identity-based dedup
//! - [`Subscription`] - continuous feed popping the head of a queue
//!
//! ## Architecture
//! ```text
//! Scheduler firings ──┐
//! Engine::add_task  ──┼──► TaskQueue::push ──► [ t1 | t2 | t3 ]  (+ membership set)
//! Repeat::run       ──┘                              │
//!                                                    ▼
//!                                  Subscription::next() ──► consumer loop
//! ```
//!
//! ## Rules
//! - A task instance that is already pending is rejected (counted, not an error).
//! - Pop order is push order.
//! - Popping removes membership: the same instance may be pushed again afterwards.

mod subscription;
mod task_queue;

pub use subscription::Subscription;
pub use task_queue::{DEFAULT_POLL_INTERVAL, TaskQueue};
