//! # Run a single execution of a task.
//!
//! Executes one run of a task under a per-run deadline and publishes its
//! lifecycle events to the [`Bus`].
//!
//! ## Event flow
//!
//! ```text
//! Success:
//!   TaskStarting → task.run() → Ok(())           → TaskStopped
//!
//! Failure:
//!   TaskStarting → task.run() → Err(e)           → TaskFailed
//!
//! Deadline:
//!   TaskStarting → deadline passes → cancel ctx  → TimeoutHit
//!                ├─ task returns within grace    → TaskStopped | TaskFailed
//!                └─ grace exhausted → abandon    → TaskFailed (Timeout)
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event: `TaskStopped` or `TaskFailed`
//! - Every `Err`, `Canceled` included, counts as a failed run
//! - Derives a **child token** per run; cancelling it never reaches the parent
//! - The child token is cancelled when the run ends, releasing anything bound to it

use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{TaskContext, TaskRef};

/// Runs `task` once with `services`, bounded by `cfg.task_timeout`.
///
/// ### Deadline behavior
/// When the deadline passes, the run's context is cancelled and `TimeoutHit`
/// is published. The task then gets `cfg.cancel_grace` to return on its own;
/// whatever it returns is the result. If it is still running after the grace,
/// the run is dropped and [`TaskError::Timeout`] returned.
pub(crate) async fn run_once<C>(
    task: &TaskRef<C>,
    services: &C,
    parent: &CancellationToken,
    cfg: &EngineConfig,
    bus: &Bus,
) -> Result<(), TaskError>
where
    C: Send + Sync + 'static,
{
    let started = Instant::now();
    let child = parent.child_token();
    let deadline = cfg.deadline().map(|d| (d, started + d));
    let ctx = match deadline {
        Some((_, at)) => TaskContext::with_deadline(child.clone(), at),
        None => TaskContext::new(child.clone()),
    };

    publish_starting(bus, task.name(), cfg.deadline());

    let mut fut = task.run(&ctx, services);
    let res = match deadline {
        Some((timeout, at)) => {
            tokio::select! {
                biased;
                r = &mut fut => r,
                _ = time::sleep_until(at) => {
                    child.cancel();
                    publish_timeout(bus, task.name(), timeout);
                    match time::timeout(cfg.cancel_grace, &mut fut).await {
                        Ok(r) => r,
                        Err(_elapsed) => Err(TaskError::Timeout { timeout }),
                    }
                }
            }
        }
        None => fut.await,
    };
    child.cancel();

    let elapsed = started.elapsed();
    match &res {
        Ok(()) => publish_stopped(bus, task.name(), elapsed),
        Err(e) => publish_failed(bus, task.name(), elapsed, e),
    }
    res
}

fn publish_starting(bus: &Bus, name: &str, timeout: Option<Duration>) {
    let mut ev = Event::new(EventKind::TaskStarting).with_task(name);
    if let Some(d) = timeout {
        ev = ev.with_timeout(d);
    }
    bus.publish(ev);
}

fn publish_stopped(bus: &Bus, name: &str, elapsed: Duration) {
    bus.publish(
        Event::new(EventKind::TaskStopped)
            .with_task(name)
            .with_elapsed(elapsed),
    );
}

fn publish_failed(bus: &Bus, name: &str, elapsed: Duration, err: &TaskError) {
    bus.publish(
        Event::new(EventKind::TaskFailed)
            .with_task(name)
            .with_elapsed(elapsed)
            .with_reason(err.to_string()),
    );
}

/// Always followed by `TaskStopped` or `TaskFailed` for the same run.
fn publish_timeout(bus: &Bus, name: &str, timeout: Duration) {
    bus.publish(
        Event::new(EventKind::TimeoutHit)
            .with_task(name)
            .with_timeout(timeout),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::tasks::TaskFn;

    fn cfg(timeout_secs: u64) -> EngineConfig {
        EngineConfig::default()
            .with_task_timeout(Duration::from_secs(timeout_secs))
            .with_cancel_grace(Duration::from_secs(5))
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventKind> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.kind)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_task_sees_cancellation_at_deadline() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let task: TaskRef<()> = TaskFn::arc("blocker", |ctx: TaskContext| async move {
            ctx.cancelled().await;
            assert!(ctx.is_expired());
            Err(TaskError::Canceled)
        });

        let start = Instant::now();
        let res = run_once(&task, &(), &CancellationToken::new(), &cfg(10), &bus).await;

        assert!(matches!(res, Err(TaskError::Canceled)));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
        assert_eq!(
            drain(&mut rx),
            [EventKind::TaskStarting, EventKind::TimeoutHit, EventKind::TaskFailed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unresponsive_task_is_abandoned_after_grace() {
        let bus = Bus::new(16);
        let task: TaskRef<()> = TaskFn::arc("stubborn", |_: TaskContext| async {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });

        let start = Instant::now();
        let res = run_once(&task, &(), &CancellationToken::new(), &cfg(10), &bus).await;

        match res {
            Err(TaskError::Timeout { timeout }) => assert_eq!(timeout, Duration::from_secs(10)),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_runs_unbounded() {
        let bus = Bus::new(16);
        let task: TaskRef<()> = TaskFn::arc("slow", |ctx: TaskContext| async move {
            assert_eq!(ctx.deadline(), None);
            time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });

        let res = run_once(&task, &(), &CancellationToken::new(), &cfg(0), &bus).await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_the_run() {
        let bus = Bus::new(16);
        let parent = CancellationToken::new();
        parent.cancel();
        let task: TaskRef<()> = TaskFn::arc("child", |ctx: TaskContext| async move {
            if ctx.is_cancelled() {
                Err(TaskError::Canceled)
            } else {
                Ok(())
            }
        });

        let res = run_once(&task, &(), &parent, &cfg(10), &bus).await;
        assert!(matches!(res, Err(TaskError::Canceled)));
    }

    #[tokio::test]
    async fn context_is_released_after_the_run() {
        let bus = Bus::new(16);
        let seen = Arc::new(parking_lot::Mutex::new(None::<TaskContext>));
        let keep = Arc::clone(&seen);
        let task: TaskRef<()> = TaskFn::arc("keeper", move |ctx: TaskContext| {
            let keep = Arc::clone(&keep);
            async move {
                *keep.lock() = Some(ctx);
                Ok(())
            }
        });

        run_once(&task, &(), &CancellationToken::new(), &cfg(10), &bus)
            .await
            .unwrap();
        let ctx = seen.lock().take().unwrap();
        assert!(ctx.is_cancelled());
    }
}
