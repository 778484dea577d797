//! # Engine configuration.
//!
//! Provides [`EngineConfig`], the runtime settings of one [`Engine`](crate::Engine).
//!
//! ## Sentinel values
//! - `task_timeout = 0s` → no execution deadline
//! - `cancel_grace = 0s` → abandon a run as soon as its deadline passes
//! - `error_capacity`, `bus_capacity` → clamped to a minimum of 1

use std::time::Duration;

/// Settings for the consumer loop and its surroundings.
///
/// ## Field semantics
/// - `task_timeout`: per-run deadline; the run's context is cancelled when it passes
/// - `cancel_grace`: how long to wait for a run to return after its context was cancelled
/// - `poll_interval`: subscription poll fallback cadence
/// - `error_capacity`: buffered failures on the error stream before the loop waits for the reader
/// - `bus_capacity`: event bus ring buffer size
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub task_timeout: Duration,
    pub cancel_grace: Duration,
    pub poll_interval: Duration,
    pub error_capacity: usize,
    pub bus_capacity: usize,
}

impl EngineConfig {
    /// Returns the per-run deadline as an `Option` (`None` = unbounded).
    #[inline]
    pub fn deadline(&self) -> Option<Duration> {
        if self.task_timeout == Duration::ZERO {
            None
        } else {
            Some(self.task_timeout)
        }
    }

    #[inline]
    pub fn error_capacity_clamped(&self) -> usize {
        self.error_capacity.max(1)
    }

    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }
}

impl Default for EngineConfig {
    /// - `task_timeout = 10min`
    /// - `cancel_grace = 5s`
    /// - `poll_interval = 500ms`
    /// - `error_capacity = 64`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            task_timeout: Duration::from_secs(10 * 60),
            cancel_grace: Duration::from_secs(5),
            poll_interval: crate::queue::DEFAULT_POLL_INTERVAL,
            error_capacity: 64,
            bus_capacity: 1024,
        }
    }
}
