//! # Engine construction.
//!
//! [`EngineBuilder`] collects the service handles, configuration, registry,
//! subscribers and tasks, then wires them in one of three modes:
//!
//! | method              | scheduler | initial queue                  |
//! |---------------------|-----------|--------------------------------|
//! | `build`             | started   | empty; cron firings feed it    |
//! | `build_single`      | none      | tasks in order + terminal      |
//! | `build_repeat`      | none      | one repeat construct           |
//!
//! Every mode reads each task's registration once and puts its collectors into
//! the registry. Only `build` also registers the schedule. Schedules are parsed
//! before anything is written to the registry.

use std::sync::Arc;

use cron::Schedule;
use tokio_util::sync::CancellationToken;

use super::{Engine, EngineHandle};
use crate::config::EngineConfig;
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::metrics::{Collector, Registry};
use crate::queue::TaskQueue;
use crate::scheduler::{Scheduler, schedule_for};
use crate::subscribers::Subscribe;
use crate::tasks::{Repeat, TaskRef};

/// Builder for an [`Engine`].
pub struct EngineBuilder<C> {
    services: Arc<C>,
    cfg: EngineConfig,
    queue: Option<Arc<TaskQueue<C>>>,
    registry: Option<Arc<Registry>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    tasks: Vec<TaskRef<C>>,
}

impl<C: Send + Sync + 'static> EngineBuilder<C> {
    /// Starts a builder around the service handles passed to every run.
    pub fn new(services: impl Into<Arc<C>>) -> Self {
        Self {
            services: services.into(),
            cfg: EngineConfig::default(),
            queue: None,
            registry: None,
            subscribers: Vec::new(),
            tasks: Vec::new(),
        }
    }

    pub fn with_config(mut self, cfg: EngineConfig) -> Self {
        self.cfg = cfg;
        self
    }

    /// Uses an existing queue instead of a fresh one.
    ///
    /// A shared queue's metrics are the owner's business and are not registered here.
    pub fn with_queue(mut self, queue: Arc<TaskQueue<C>>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Registry receiving queue and task collectors. Defaults to a private one.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive runtime events through dedicated workers with
    /// bounded queues, starting when the engine starts.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    pub fn with_tasks(mut self, tasks: Vec<TaskRef<C>>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Continuous engine: tasks are scheduled by their cron expressions.
    ///
    /// Fails with [`RuntimeError::InvalidSchedule`] on the first bad
    /// expression, or [`RuntimeError::Metrics`] on a duplicate collector.
    /// A failed build leaves the registry untouched.
    pub fn build(self) -> Result<Engine<C>, RuntimeError> {
        let (parts, schedules) = self.assemble(true)?;

        let scheduler = Scheduler::new(Arc::clone(parts.handle.queue()))
            .with_bus(parts.handle.bus().clone());
        for (task, schedule) in schedules {
            scheduler.insert(task, schedule);
        }
        Ok(parts.finish(Some(Arc::new(scheduler))))
    }

    /// Batch engine: tasks once in order, then a terminal sentinel.
    pub fn build_single(self) -> Result<Engine<C>, RuntimeError> {
        let (parts, _) = self.assemble(false)?;

        let handle = &parts.handle;
        handle.queue().push_all(parts.tasks.iter().cloned());
        handle.queue().push(handle.terminal_task());
        Ok(parts.finish(None))
    }

    /// Loop engine: the tasks cycle until `until` holds, then the engine stops.
    pub fn build_repeat<F>(self, until: F) -> Result<Engine<C>, RuntimeError>
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        let (parts, _) = self.assemble(false)?;

        let repeat = Repeat::new(&parts.handle, parts.tasks.clone(), until);
        parts.handle.queue().push(repeat);
        Ok(parts.finish(None))
    }

    /// Loop engine that only stops through `stop()` or the root context.
    pub fn build_repeat_forever(self) -> Result<Engine<C>, RuntimeError> {
        self.build_repeat(|| false)
    }

    /// Reads every registration once, parses schedules, then registers all
    /// collectors in one batch. Nothing is registered unless everything is valid.
    fn assemble(self, scheduled: bool) -> Result<(Parts<C>, Vec<Scheduled<C>>), RuntimeError> {
        let registry = self.registry.unwrap_or_default();
        let mut collectors: Vec<Arc<dyn Collector>> = Vec::new();

        let queue = match self.queue {
            Some(shared) => shared,
            None => {
                let owned = Arc::new(TaskQueue::new());
                collectors.extend(owned.collectors());
                owned
            }
        };

        let mut schedules = Vec::new();
        for task in &self.tasks {
            let reg = task.registration();
            if scheduled && reg.is_scheduled() {
                let schedule = schedule_for(task.name(), &reg.schedule)?;
                schedules.push((Arc::clone(task), schedule));
            }
            collectors.extend(reg.collectors);
        }
        registry.register_all(collectors)?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let handle = EngineHandle::new(queue, CancellationToken::new(), bus);

        let parts = Parts {
            cfg: self.cfg,
            services: self.services,
            handle,
            registry,
            subscribers: self.subscribers,
            tasks: self.tasks,
        };
        Ok((parts, schedules))
    }
}

type Scheduled<C> = (TaskRef<C>, Schedule);

struct Parts<C> {
    cfg: EngineConfig,
    services: Arc<C>,
    handle: EngineHandle<C>,
    registry: Arc<Registry>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    tasks: Vec<TaskRef<C>>,
}

impl<C: Send + Sync + 'static> Parts<C> {
    fn finish(self, scheduler: Option<Arc<Scheduler<C>>>) -> Engine<C> {
        Engine::from_parts(
            self.cfg,
            self.services,
            self.handle,
            scheduler,
            self.registry,
            self.subscribers,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricsError;
    use crate::metrics::{Counter, Opts};
    use crate::tasks::{Registration, Task, TaskContext, TaskFn};
    use crate::error::TaskError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted {
        runs: Arc<Counter>,
    }

    #[async_trait]
    impl Task<()> for Counted {
        fn name(&self) -> &str {
            "counted"
        }

        async fn run(&self, _ctx: &TaskContext, _services: &()) -> Result<(), TaskError> {
            self.runs.inc();
            Ok(())
        }

        fn registration(&self) -> Registration {
            Registration::new("*/5 * * * *").with_collector(self.runs.clone())
        }
    }

    struct Tracked {
        reads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Task<()> for Tracked {
        fn name(&self) -> &str {
            "tracked"
        }

        async fn run(&self, _ctx: &TaskContext, _services: &()) -> Result<(), TaskError> {
            Ok(())
        }

        fn registration(&self) -> Registration {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Registration::new("0 * * * *")
        }
    }

    fn counted() -> TaskRef<()> {
        Arc::new(Counted {
            runs: Counter::new(Opts::new("runs_total").namespace("test")),
        })
    }

    #[test]
    fn single_mode_queues_tasks_then_terminal() {
        let a: TaskRef<()> = TaskFn::arc("a", |_: TaskContext| async { Ok(()) });
        let b: TaskRef<()> = TaskFn::arc("b", |_: TaskContext| async { Ok(()) });
        let engine = EngineBuilder::new(())
            .with_tasks(vec![a, b])
            .build_single()
            .unwrap();

        let q = engine.queue();
        let names: Vec<String> = std::iter::from_fn(|| q.pop())
            .map(|t| t.name().to_string())
            .collect();
        assert_eq!(names, ["a", "b", "terminal_task"]);
        assert!(engine.scheduler().is_none());
    }

    #[test]
    fn continuous_mode_registers_collectors_and_schedules() {
        let registry = Arc::new(Registry::new());
        let engine = EngineBuilder::new(())
            .with_registry(Arc::clone(&registry))
            .with_tasks(vec![counted()])
            .build()
            .unwrap();

        assert!(registry.is_registered("test_runs_total"));
        assert!(registry.is_registered("probevisor_queue_length"));
        assert_eq!(engine.scheduler().map(|s| s.len()), Some(1));
        assert!(engine.queue().is_empty());
    }

    #[test]
    fn duplicate_collector_fails_the_build() {
        let registry = Arc::new(Registry::new());
        let err = EngineBuilder::new(())
            .with_registry(registry)
            .with_tasks(vec![counted(), counted()])
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Metrics(MetricsError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn failed_build_leaves_the_registry_empty() {
        let registry = Arc::new(Registry::new());
        let bad: TaskRef<()> = Arc::new(
            TaskFn::new("bad", |_: TaskContext| async { Ok(()) }).with_schedule("not a cron"),
        );
        let err = EngineBuilder::new(())
            .with_registry(Arc::clone(&registry))
            .with_tasks(vec![counted(), bad])
            .build()
            .unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidSchedule { .. }));
        assert!(registry.is_empty());

        EngineBuilder::new(())
            .with_registry(Arc::clone(&registry))
            .with_tasks(vec![counted()])
            .build()
            .unwrap();
        assert!(registry.is_registered("test_runs_total"));
        assert!(registry.is_registered("probevisor_queue_length"));
    }

    #[test]
    fn registration_is_read_once_per_task() {
        let reads = Arc::new(AtomicUsize::new(0));
        let task: TaskRef<()> = Arc::new(Tracked {
            reads: Arc::clone(&reads),
        });
        let engine = EngineBuilder::new(()).with_tasks(vec![task]).build().unwrap();

        assert_eq!(reads.load(Ordering::SeqCst), 1);
        assert_eq!(engine.scheduler().map(|s| s.len()), Some(1));
    }

    #[test]
    fn shared_queue_metrics_are_left_alone() {
        let registry = Arc::new(Registry::new());
        let queue = Arc::new(TaskQueue::<()>::new());
        queue.register_metrics(&registry).unwrap();

        EngineBuilder::new(())
            .with_registry(Arc::clone(&registry))
            .with_queue(Arc::clone(&queue))
            .build_single()
            .unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn repeat_mode_starts_with_one_construct() {
        let x: TaskRef<()> = TaskFn::arc("x", |_: TaskContext| async { Ok(()) });
        let engine = EngineBuilder::new(())
            .with_tasks(vec![x])
            .build_repeat_forever()
            .unwrap();
        assert_eq!(engine.queue().len(), 1);
        assert_eq!(engine.queue().pop().unwrap().name(), "repeat_task");
    }
}
