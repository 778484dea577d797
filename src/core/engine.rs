//! # Engine: one queue, one consumer loop, strictly sequential runs.
//!
//! The [`Engine`] owns a [`TaskQueue`], optionally a cron [`Scheduler`] feeding
//! it, and the service handles passed to every run. [`Engine::start`] spawns
//! the sole consumer loop and hands back the error stream.
//!
//! ## High-level architecture
//! ```text
//! Producers:
//!   Scheduler (cron) ──┐
//!   Engine/Handle ─────┼──► TaskQueue::push ──► Subscription::next
//!   Repeat / Terminal ─┘                               │
//!                                                      ▼
//! Consumer loop (one tokio task):
//!   loop {
//!     select! (biased) {
//!       shutdown token / root ctx cancelled ──► break
//!       task = subscription.next()
//!     }
//!     run_once(task, services, child(ctx) + deadline)
//!        └─ Err(e) ──► error stream (TaskFailure)    loop continues
//!   }
//!   scheduler.stop() ──► publish EngineStopped ──► drop error sender (stream closes)
//!
//! Event flow:
//!   runner / handle / scheduler ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//! ```
//!
//! ## Rules
//! - Shutdown is observed only between runs; an in-flight run completes or times out first.
//! - Root context cancellation propagates into the in-flight run; engine shutdown does not.
//! - A failed run never stops the loop and is never retried by the engine.
//! - `start()` succeeds once per engine.
//! - The loop yields to the runtime after every run, so back-to-back instant runs cannot starve it.
//!
//! ## Example
//! ```rust
//! use probevisor::{EngineBuilder, TaskContext, TaskFn, TaskRef};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let a: TaskRef<()> = TaskFn::arc("a", |_: TaskContext| async { Ok(()) });
//!     let b: TaskRef<()> = TaskFn::arc("b", |_: TaskContext| async { Ok(()) });
//!
//!     let engine = EngineBuilder::new(()).with_tasks(vec![a, b]).build_single()?;
//!     let mut errors = engine.start(CancellationToken::new())?;
//!     while let Some(failure) = errors.recv().await {
//!         eprintln!("{failure}");
//!     }
//!     engine.wait().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::handle::EngineHandle;
use super::runner::run_once;
use crate::config::EngineConfig;
use crate::error::{RuntimeError, TaskFailure};
use crate::events::{Bus, Event, EventKind};
use crate::metrics::Registry;
use crate::queue::TaskQueue;
use crate::scheduler::Scheduler;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::TaskRef;

/// Lifecycle of an [`Engine`]: `Initialized → Running → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Built, `start()` not called yet.
    Initialized,
    /// Consumer loop is running.
    Running,
    /// Consumer loop exited and subscribers drained.
    Stopped,
}

/// Scheduling and dispatch core over a service-handle bundle `C`.
pub struct Engine<C> {
    cfg: EngineConfig,
    services: Arc<C>,
    handle: EngineHandle<C>,
    scheduler: Option<Arc<Scheduler<C>>>,
    registry: Arc<Registry>,
    subscribers: Mutex<Vec<Arc<dyn Subscribe>>>,
    state: Arc<watch::Sender<EngineState>>,
}

impl<C: Send + Sync + 'static> Engine<C> {
    /// Continuous engine: every task is attached and fed by its cron schedule.
    ///
    /// Shorthand for [`EngineBuilder::build`](crate::EngineBuilder::build).
    pub fn new(
        services: impl Into<Arc<C>>,
        tasks: Vec<TaskRef<C>>,
        registry: Arc<Registry>,
    ) -> Result<Self, RuntimeError> {
        super::EngineBuilder::new(services)
            .with_registry(registry)
            .with_tasks(tasks)
            .build()
    }

    /// Batch engine: runs `tasks` once in order, then stops.
    ///
    /// Shorthand for [`EngineBuilder::build_single`](crate::EngineBuilder::build_single).
    pub fn single(
        services: impl Into<Arc<C>>,
        tasks: Vec<TaskRef<C>>,
        registry: Arc<Registry>,
    ) -> Result<Self, RuntimeError> {
        super::EngineBuilder::new(services)
            .with_registry(registry)
            .with_tasks(tasks)
            .build_single()
    }

    pub(super) fn from_parts(
        cfg: EngineConfig,
        services: Arc<C>,
        handle: EngineHandle<C>,
        scheduler: Option<Arc<Scheduler<C>>>,
        registry: Arc<Registry>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            cfg,
            services,
            handle,
            scheduler,
            registry,
            subscribers: Mutex::new(subscribers),
            state: Arc::new(watch::Sender::new(EngineState::Initialized)),
        }
    }

    /// Spawns the consumer loop and returns the error stream.
    ///
    /// The stream yields one [`TaskFailure`] per failed run and closes when
    /// the loop exits. Dropping the receiver discards later failures without
    /// affecting the loop. `ctx` is the root context: cancelling it cancels
    /// the in-flight run and stops the loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        ctx: CancellationToken,
    ) -> Result<mpsc::Receiver<TaskFailure>, RuntimeError> {
        let mut first = false;
        self.state.send_if_modified(|s| {
            if *s == EngineState::Initialized {
                *s = EngineState::Running;
                first = true;
            }
            first
        });
        if !first {
            return Err(RuntimeError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel(self.cfg.error_capacity_clamped());
        let listener = self.subscriber_listener();

        if let Some(scheduler) = &self.scheduler {
            scheduler.start();
        }

        let consumer = Consumer {
            cfg: self.cfg.clone(),
            services: Arc::clone(&self.services),
            queue: Arc::clone(self.handle.queue()),
            bus: self.handle.bus().clone(),
            shutdown: self.handle.shutdown_token(),
            root: ctx,
            errors: tx,
        };
        let scheduler = self.scheduler.clone();
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let bus = consumer.bus.clone();
            consumer.run().await;

            if let Some(scheduler) = scheduler {
                scheduler.stop();
            }
            bus.publish(Event::new(EventKind::EngineStopped));
            if let Some(listener) = listener {
                let _ = listener.await;
            }
            state.send_replace(EngineState::Stopped);
        });
        Ok(rx)
    }

    /// Signals shutdown. The loop exits after the in-flight run, if any.
    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Enqueues `task`; returns `false` if the same instance is already pending.
    pub fn add_task(&self, task: TaskRef<C>) -> bool {
        self.handle.add_task(task)
    }

    /// Fresh terminal sentinel bound to this engine.
    pub fn terminal_task(&self) -> TaskRef<C> {
        self.handle.terminal_task()
    }

    /// Repeat construct over `tasks`, stopping this engine once `until` holds.
    pub fn repeat<F>(&self, tasks: Vec<TaskRef<C>>, until: F) -> TaskRef<C>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.handle.repeat(tasks, until)
    }

    /// Repeat construct that never stops on its own.
    pub fn repeat_forever(&self, tasks: Vec<TaskRef<C>>) -> TaskRef<C> {
        self.handle.repeat_forever(tasks)
    }

    /// Cloneable injection handle.
    pub fn handle(&self) -> EngineHandle<C> {
        self.handle.clone()
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Waits until the loop exited and subscribers drained.
    ///
    /// Returns immediately if the engine was never started.
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx
            .wait_for(|s| *s != EngineState::Running)
            .await;
    }

    pub fn queue(&self) -> &Arc<TaskQueue<C>> {
        self.handle.queue()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn bus(&self) -> &Bus {
        self.handle.bus()
    }

    pub fn scheduler(&self) -> Option<&Scheduler<C>> {
        self.scheduler.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Subscribes to the bus and forwards events to the subscriber set until
    /// `EngineStopped` went through.
    fn subscriber_listener(&self) -> Option<JoinHandle<()>> {
        let subs = std::mem::take(&mut *self.subscribers.lock());
        if subs.is_empty() {
            return None;
        }
        let bus = self.handle.bus().clone();
        let mut rx = bus.subscribe();
        let set = SubscriberSet::new(subs, bus);

        Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        let last = ev.kind == EventKind::EngineStopped;
                        set.emit(ev);
                        if last {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "subscriber listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        }))
    }
}

impl<C> std::fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// State moved into the consumer task.
struct Consumer<C> {
    cfg: EngineConfig,
    services: Arc<C>,
    queue: Arc<TaskQueue<C>>,
    bus: Bus,
    shutdown: CancellationToken,
    root: CancellationToken,
    errors: mpsc::Sender<TaskFailure>,
}

impl<C: Send + Sync + 'static> Consumer<C> {
    async fn run(self) {
        let mut feed = self.queue.subscribe(self.cfg.poll_interval);

        loop {
            let task = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.root.cancelled() => break,
                task = feed.next() => task,
            };

            let res = run_once(&task, &self.services, &self.root, &self.cfg, &self.bus).await;
            if let Err(error) = res {
                let failure = TaskFailure {
                    task: task.name().to_string(),
                    error,
                };
                // Receiver gone: nobody is listening, keep running.
                let _ = self.errors.send(failure).await;
            }

            // A run that returns without awaiting anything, followed by an
            // immediate pop, never gives the runtime back otherwise.
            tokio::task::yield_now().await;
        }

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
    }
}
