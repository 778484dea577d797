//! # Known-good content check.
//!
//! Fetches paths whose content is known in advance and compares the bodies.
//!
//! ## Collectors (`gatewaymonitor_task_known_good_*`)
//! - `latency_seconds{pop}`: time to first byte
//! - `fetch_seconds{pop}`: total fetch time
//! - `fail_count{pop, location}`: gateway answered, but wrong status or content
//! - `error_count`: request could not complete

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::fetch::fetch;
use super::{Gateway, pop_to_location};
use crate::metrics::{Counter, Histogram, Opts, linear_buckets};
use crate::{Registration, Task, TaskContext, TaskError};

fn opts(name: &str) -> Opts {
    Opts::new(name)
        .namespace("gatewaymonitor_task")
        .subsystem("known_good")
}

/// Compares gateway responses with expected bytes.
pub struct KnownGoodCheck {
    schedule: String,
    checks: Vec<(String, Vec<u8>)>,
    latency: Arc<Histogram>,
    fetch_time: Arc<Histogram>,
    fails: Arc<Counter>,
    errors: Arc<Counter>,
}

impl KnownGoodCheck {
    /// `checks` are `(path, expected body)` pairs, fetched in order.
    pub fn new(schedule: impl Into<String>, checks: Vec<(String, Vec<u8>)>) -> Arc<Self> {
        Arc::new(Self {
            schedule: schedule.into(),
            checks,
            latency: Histogram::with_labels(
                opts("latency_seconds").help("Time to first byte"),
                linear_buckets(0.0, 10.0, 10), // 0-100 seconds
                &["pop"],
            ),
            fetch_time: Histogram::with_labels(
                opts("fetch_seconds").help("Total fetch time"),
                linear_buckets(0.0, 0.1, 10), // small file
                &["pop"],
            ),
            fails: Counter::with_labels(
                opts("fail_count").help("Responses with unexpected status or content"),
                &["pop", "location"],
            ),
            errors: Counter::new(opts("error_count").help("Requests that did not complete")),
        })
    }

    pub fn fails(&self, pop: &str) -> u64 {
        self.fails.get_with(&[pop, pop_to_location(pop)])
    }

    pub fn errors(&self) -> u64 {
        self.errors.get()
    }

    fn fail(&self, pop: &str, msg: String) -> TaskError {
        self.fails.inc_with(&[pop, pop_to_location(pop)]);
        warn!(task = "known_good", pop, "{msg}");
        TaskError::fail(msg)
    }
}

#[async_trait]
impl Task<Gateway> for KnownGoodCheck {
    fn name(&self) -> &str {
        "known_good"
    }

    async fn run(&self, ctx: &TaskContext, gw: &Gateway) -> Result<(), TaskError> {
        for (path, expected) in &self.checks {
            let got = match fetch(ctx, gw, "known_good", path).await {
                Ok(got) => got,
                Err(e) => {
                    if !matches!(e, TaskError::Canceled) {
                        self.errors.inc();
                    }
                    return Err(e);
                }
            };

            if got.status != 200 {
                return Err(self.fail(
                    &got.pop,
                    format!("expected status 200 from gateway, got {}: {path}", got.status),
                ));
            }

            self.latency
                .observe_with(&[got.pop.as_str()], got.first_byte.as_secs_f64());
            self.fetch_time.observe_with(&[got.pop.as_str()], got.total.as_secs_f64());
            info!(
                task = "known_good",
                pop = %got.pop,
                ms = got.total.as_millis() as u64,
                "finished download"
            );

            if got.body != *expected {
                return Err(self.fail(
                    &got.pop,
                    format!("response does not match known content: {path}"),
                ));
            }
        }
        Ok(())
    }

    fn registration(&self) -> Registration {
        Registration::new(self.schedule.clone())
            .with_collector(self.latency.clone())
            .with_collector(self.fetch_time.clone())
            .with_collector(self.fails.clone())
            .with_collector(self.errors.clone())
    }

    fn latency_hist(&self) -> Option<Arc<Histogram>> {
        Some(self.latency.clone())
    }

    fn fetch_hist(&self) -> Option<Arc<Histogram>> {
        Some(self.fetch_time.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fails_are_labelled_with_location() {
        let t = KnownGoodCheck::new("* * * * *", Vec::new());
        let err = t.fail("gateway-bank1-sjc1", "boom".into());
        assert_eq!(err.as_label(), "task_failed");
        assert_eq!(t.fails("gateway-bank1-sjc1"), 1);
        assert_eq!(t.fails.get_with(&["gateway-bank1-sjc1", "sjc1"]), 1);
    }

    #[test]
    fn exposes_its_histograms() {
        let t = KnownGoodCheck::new("* * * * *", Vec::new());
        let reg = Task::<Gateway>::registration(t.as_ref());
        assert_eq!(reg.collectors.len(), 4);
        assert!(Task::<Gateway>::latency_hist(t.as_ref()).is_some());
        assert!(Task::<Gateway>::fetch_hist(t.as_ref()).is_some());
    }

    #[tokio::test]
    async fn unreachable_gateway_counts_an_error() {
        let gw = Gateway::with_client(reqwest::Client::new(), "http://127.0.0.1:9");
        let t = KnownGoodCheck::new("", vec![("/ipfs/x".into(), Vec::new())]);
        let ctx = TaskContext::new(tokio_util::sync::CancellationToken::new());

        let err = t.run(&ctx, &gw).await.unwrap_err();
        assert_eq!(err.as_label(), "task_failed");
        assert_eq!(t.errors(), 1);
    }
}
