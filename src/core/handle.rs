//! # Cloneable injection handle.
//!
//! [`EngineHandle`] is what outlives borrows of the engine: the queue, the
//! shutdown token and the event bus. Embedding code holds a handle instead of
//! the engine itself.
//!
//! Anything that may sit inside the queue (repeat constructs) holds a
//! [`WeakHandle`] instead: the queue owns its pending tasks, so a strong handle
//! there would keep the queue alive forever.

use std::sync::{Arc, Weak};

use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::queue::TaskQueue;
use crate::tasks::{Repeat, TaskRef, Terminal};

/// Enqueue and shutdown access to one engine.
pub struct EngineHandle<C> {
    queue: Arc<TaskQueue<C>>,
    shutdown: CancellationToken,
    bus: Bus,
}

impl<C> Clone for EngineHandle<C> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            shutdown: self.shutdown.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<C: Send + Sync + 'static> EngineHandle<C> {
    pub(crate) fn new(queue: Arc<TaskQueue<C>>, shutdown: CancellationToken, bus: Bus) -> Self {
        Self {
            queue,
            shutdown,
            bus,
        }
    }

    /// Enqueues `task`; returns `false` if the same instance is already pending.
    ///
    /// Publishes `TaskEnqueued` or `TaskRejected`.
    pub fn add_task(&self, task: TaskRef<C>) -> bool {
        let name: Arc<str> = Arc::from(task.name());
        let accepted = self.queue.push(task);
        let kind = if accepted {
            EventKind::TaskEnqueued
        } else {
            EventKind::TaskRejected
        };
        self.bus.publish(Event::new(kind).with_task(name));
        accepted
    }

    /// Fresh terminal sentinel bound to this engine.
    pub fn terminal_task(&self) -> TaskRef<C> {
        Arc::new(Terminal::new(self.shutdown.clone()))
    }

    /// Repeat construct over `tasks`, stopping the engine once `until` holds.
    pub fn repeat<F>(&self, tasks: Vec<TaskRef<C>>, until: F) -> TaskRef<C>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Repeat::new(self, tasks, until)
    }

    /// Repeat construct that never stops on its own.
    pub fn repeat_forever(&self, tasks: Vec<TaskRef<C>>) -> TaskRef<C> {
        Repeat::forever(self, tasks)
    }

    /// Signals shutdown. The consumer loop observes it between runs.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// `true` once shutdown was signalled.
    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn queue(&self) -> &Arc<TaskQueue<C>> {
        &self.queue
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Handle that does not keep the queue alive.
    pub fn downgrade(&self) -> WeakHandle<C> {
        WeakHandle {
            queue: Arc::downgrade(&self.queue),
            shutdown: self.shutdown.clone(),
            bus: self.bus.clone(),
        }
    }
}

/// Non-owning [`EngineHandle`].
pub struct WeakHandle<C> {
    queue: Weak<TaskQueue<C>>,
    shutdown: CancellationToken,
    bus: Bus,
}

impl<C> Clone for WeakHandle<C> {
    fn clone(&self) -> Self {
        Self {
            queue: Weak::clone(&self.queue),
            shutdown: self.shutdown.clone(),
            bus: self.bus.clone(),
        }
    }
}

impl<C> WeakHandle<C> {
    /// `None` once the engine and every other strong handle are gone.
    pub fn upgrade(&self) -> Option<EngineHandle<C>> {
        Some(EngineHandle {
            queue: self.queue.upgrade()?,
            shutdown: self.shutdown.clone(),
            bus: self.bus.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{TaskContext, TaskFn};

    #[tokio::test]
    async fn add_task_reports_dedup_on_the_bus() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();
        let h = EngineHandle::new(Arc::new(TaskQueue::new()), CancellationToken::new(), bus);
        let t: TaskRef<()> = TaskFn::arc("ping", |_: TaskContext| async { Ok(()) });

        assert!(h.add_task(Arc::clone(&t)));
        assert!(!h.add_task(t));

        assert_eq!(rx.recv().await.unwrap().kind, EventKind::TaskEnqueued);
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TaskRejected);
        assert_eq!(ev.task.as_deref(), Some("ping"));
    }

    #[test]
    fn weak_handle_does_not_keep_the_queue() {
        let h: EngineHandle<()> =
            EngineHandle::new(Arc::new(TaskQueue::new()), CancellationToken::new(), Bus::new(8));
        let weak = h.downgrade();
        assert!(weak.upgrade().is_some());

        drop(h);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn terminal_tasks_are_distinct_instances() {
        let h: EngineHandle<()> =
            EngineHandle::new(Arc::new(TaskQueue::new()), CancellationToken::new(), Bus::new(8));
        assert!(h.add_task(h.terminal_task()));
        assert!(h.add_task(h.terminal_task()));
        assert_eq!(h.queue().len(), 2);
    }
}
