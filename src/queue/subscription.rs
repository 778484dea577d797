//! # Continuous delivery feed over a [`TaskQueue`].
//!
//! ```text
//! next():
//!   loop {
//!     ├─► arm push notification
//!     ├─► pop() ── Some(task) ──► return task
//!     └─► wait: push notification | poll tick
//!   }
//! ```
//!
//! ## Rules
//! - Never terminates on its own; the consumer decides when to stop polling it.
//! - Worst-case latency for a fresh push is one poll interval (normally a push wakes it immediately).
//! - `next()` is cancel-safe: a task is only popped in the poll that returns it.

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::time::{self, Interval, MissedTickBehavior};

use super::TaskQueue;
use crate::tasks::TaskRef;

/// Feed popping tasks off one queue.
pub struct Subscription<C> {
    queue: Arc<TaskQueue<C>>,
    ticker: Interval,
}

impl<C> Subscription<C> {
    pub(super) fn new(queue: Arc<TaskQueue<C>>, poll_interval: Duration) -> Self {
        let period = poll_interval.max(Duration::from_millis(1));
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { queue, ticker }
    }

    /// Waits until a task is available and returns it.
    pub async fn next(&mut self) -> TaskRef<C> {
        loop {
            let notified = self.queue.notify().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(task) = self.queue.pop() {
                return task;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = self.ticker.tick() => {}
            }
        }
    }

    /// Same feed as a never-ending [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = TaskRef<C>> {
        futures::stream::unfold(self, |mut sub| async move {
            let task = sub.next().await;
            Some((task, sub))
        })
    }
}
