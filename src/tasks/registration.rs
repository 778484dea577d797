//! # Static registration descriptor.
//!
//! A [`Registration`] tells the engine when to enqueue a task (a cron
//! expression, or nothing) and which collectors to register on attach.

use std::fmt;
use std::sync::Arc;

use crate::metrics::Collector;

/// Schedule expression plus the collectors a task owns.
///
/// - `schedule`: cron expression; empty = not scheduled (only enqueued by hand or by a repeat construct).
/// - `collectors`: registered exactly once, when the task is attached to an engine.
#[derive(Clone, Default)]
pub struct Registration {
    pub schedule: String,
    pub collectors: Vec<Arc<dyn Collector>>,
}

impl Registration {
    pub fn new(schedule: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
            collectors: Vec::new(),
        }
    }

    pub fn with_collector(mut self, collector: Arc<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    /// `true` when the schedule expression is non-blank.
    pub fn is_scheduled(&self) -> bool {
        !self.schedule.trim().is_empty()
    }

    /// `true` for control tasks: no schedule, no collectors.
    pub fn is_empty(&self) -> bool {
        !self.is_scheduled() && self.collectors.is_empty()
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.collectors.iter().map(|c| c.name()).collect();
        f.debug_struct("Registration")
            .field("schedule", &self.schedule)
            .field("collectors", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Counter, Opts};

    #[test]
    fn blank_schedule_is_not_scheduled() {
        assert!(!Registration::new("   ").is_scheduled());
        assert!(Registration::default().is_empty());

        let reg = Registration::new("").with_collector(Counter::new(Opts::new("x")));
        assert!(!reg.is_scheduled());
        assert!(!reg.is_empty());
    }
}
