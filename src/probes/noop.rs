use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::metrics::{Gauge, Opts};
use crate::{Registration, Task, TaskContext, TaskError};

/// Sleeps `seconds` one second at a time, adding 1 to a gauge after each.
///
/// Works with any service bundle; handy for exercising the engine.
pub struct NoopTask {
    schedule: String,
    seconds: u64,
    ticks: Arc<Gauge>,
}

impl NoopTask {
    pub fn new(schedule: impl Into<String>, seconds: u64) -> Arc<Self> {
        Arc::new(Self {
            schedule: schedule.into(),
            seconds,
            ticks: Gauge::new(
                Opts::new("noopgauge")
                    .namespace("gatewaymonitor_task")
                    .subsystem("noop"),
            ),
        })
    }

    pub fn ticks(&self) -> f64 {
        self.ticks.get()
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Task<C> for NoopTask {
    fn name(&self) -> &str {
        "noop"
    }

    async fn run(&self, ctx: &TaskContext, _services: &C) -> Result<(), TaskError> {
        for _ in 0..self.seconds {
            tokio::select! {
                _ = ctx.cancelled() => return Err(TaskError::Canceled),
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
            self.ticks.add(1.0);
        }
        Ok(())
    }

    fn registration(&self) -> Registration {
        Registration::new(self.schedule.clone()).with_collector(self.ticks.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_second() {
        let t = NoopTask::new("", 3);
        let ctx = TaskContext::new(CancellationToken::new());
        Task::<()>::run(t.as_ref(), &ctx, &()).await.unwrap();
        assert_eq!(t.ticks(), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_cancelled() {
        let t = NoopTask::new("", 3600);
        let token = CancellationToken::new();
        let ctx = TaskContext::new(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            token.cancel();
        });
        let err = Task::<()>::run(t.as_ref(), &ctx, &()).await.unwrap_err();
        assert!(matches!(err, TaskError::Canceled));
        assert_eq!(t.ticks(), 2.0);
        canceller.await.unwrap();
    }
}
