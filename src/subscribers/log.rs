//! # LogWriter - engine events through `tracing`.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO probevisor: starting task=known_good timeout_ms=600000
//! WARN probevisor: failed task=known_good elapsed_ms=812 err="status 502"
//! WARN probevisor: timeout task=random_local timeout_ms=600000
//! DEBUG probevisor: rejected task=known_good (already pending)
//! INFO probevisor: engine stopped
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Writes every event as a `tracing` record under target `probevisor`.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TaskEnqueued => {
                debug!(target: "probevisor", task, "enqueued");
            }
            EventKind::TaskRejected => {
                debug!(target: "probevisor", task, "rejected (already pending)");
            }
            EventKind::ScheduleFired => {
                debug!(target: "probevisor", task, outcome = reason, "schedule fired");
            }
            EventKind::TaskStarting => {
                info!(target: "probevisor", task, timeout_ms = e.timeout_ms, "starting");
            }
            EventKind::TaskStopped => {
                info!(target: "probevisor", task, elapsed_ms = e.elapsed_ms, "stopped");
            }
            EventKind::TaskFailed => {
                warn!(target: "probevisor", task, elapsed_ms = e.elapsed_ms, err = reason, "failed");
            }
            EventKind::TimeoutHit => {
                warn!(target: "probevisor", task, timeout_ms = e.timeout_ms, "timeout");
            }
            EventKind::ShutdownRequested => {
                info!(target: "probevisor", "shutdown requested");
            }
            EventKind::EngineStopped => {
                info!(target: "probevisor", "engine stopped");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "probevisor", subscriber = task, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "probevisor", subscriber = task, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
