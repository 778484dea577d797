//! # MetricsWriter - one observation per execution outcome.
//!
//! Turns `TaskStopped` / `TaskFailed` events into:
//! - `probevisor_engine_task_outcomes_total{task, outcome}` (`outcome` = `success` | `failure`)
//! - `probevisor_engine_task_duration_seconds{task}`
//! - `probevisor_engine_timeouts_total{task}`
//!
//! Label schemes of individual probes are their own business; this subscriber
//! only guarantees that every finished run is counted exactly once.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::MetricsError;
use crate::events::{Event, EventKind};
use crate::metrics::{Collector, Counter, Histogram, Opts, Registry, linear_buckets};
use crate::subscribers::Subscribe;

/// Records run outcomes into collectors it registers itself.
pub struct MetricsWriter {
    outcomes: Arc<Counter>,
    duration: Arc<Histogram>,
    timeouts: Arc<Counter>,
}

impl MetricsWriter {
    /// Creates the collectors and registers them in `registry`.
    pub fn register(registry: &Registry) -> Result<Self, MetricsError> {
        let me = Self {
            outcomes: Counter::with_labels(
                Opts::new("task_outcomes_total")
                    .namespace("probevisor")
                    .subsystem("engine")
                    .help("Finished task runs by outcome"),
                &["task", "outcome"],
            ),
            duration: Histogram::with_labels(
                Opts::new("task_duration_seconds")
                    .namespace("probevisor")
                    .subsystem("engine")
                    .help("Wall time of task runs"),
                linear_buckets(0.0, 30.0, 21), // 0-10 minutes
                &["task"],
            ),
            timeouts: Counter::with_labels(
                Opts::new("timeouts_total")
                    .namespace("probevisor")
                    .subsystem("engine")
                    .help("Runs that hit their execution deadline"),
                &["task"],
            ),
        };
        let collectors: [Arc<dyn Collector>; 3] = [
            me.outcomes.clone(),
            me.duration.clone(),
            me.timeouts.clone(),
        ];
        registry.register_all(collectors)?;
        Ok(me)
    }

    pub fn outcomes(&self, task: &str, outcome: &str) -> u64 {
        self.outcomes.get_with(&[task, outcome])
    }
}

#[async_trait]
impl Subscribe for MetricsWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("unknown");
        let outcome = match e.kind {
            EventKind::TaskStopped => "success",
            EventKind::TaskFailed => "failure",
            EventKind::TimeoutHit => {
                self.timeouts.inc_with(&[task]);
                return;
            }
            _ => return,
        };

        self.outcomes.inc_with(&[task, outcome]);
        if let Some(elapsed) = e.elapsed() {
            self.duration.observe_with(&[task], elapsed.as_secs_f64());
        }
    }

    fn name(&self) -> &'static str {
        "metrics"
    }

    fn queue_capacity(&self) -> usize {
        2048
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn each_outcome_counted_once() {
        let reg = Registry::new();
        let w = MetricsWriter::register(&reg).unwrap();

        w.on_event(&Event::new(EventKind::TaskStarting).with_task("a")).await;
        w.on_event(
            &Event::new(EventKind::TaskStopped)
                .with_task("a")
                .with_elapsed(Duration::from_secs(2)),
        )
        .await;
        w.on_event(&Event::new(EventKind::TimeoutHit).with_task("a")).await;
        w.on_event(
            &Event::new(EventKind::TaskFailed)
                .with_task("a")
                .with_elapsed(Duration::from_secs(600)),
        )
        .await;

        assert_eq!(w.outcomes("a", "success"), 1);
        assert_eq!(w.outcomes("a", "failure"), 1);
        assert_eq!(w.duration.sample_count_with(&["a"]), (2, 602.0));
        assert_eq!(w.timeouts.get_with(&["a"]), 1);
    }

    #[test]
    fn registering_twice_fails() {
        let reg = Registry::new();
        MetricsWriter::register(&reg).unwrap();
        assert!(MetricsWriter::register(&reg).is_err());
    }
}
