//! # Terminal sentinel.
//!
//! A [`Terminal`] does one thing when run: it fires the shutdown signal of the
//! engine it was created for. The consumer loop finishes the sentinel's own run
//! and observes the signal before dequeuing anything else, so tasks queued
//! behind it never run.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::TaskError;
use crate::tasks::{Task, TaskContext};

/// Task that stops its engine.
///
/// Obtain one through [`Engine::terminal_task`](crate::Engine::terminal_task)
/// or [`EngineHandle::terminal_task`](crate::EngineHandle::terminal_task);
/// every call yields a fresh instance, so it is never rejected by dedup.
#[derive(Debug, Clone)]
pub struct Terminal {
    shutdown: CancellationToken,
}

impl Terminal {
    pub(crate) fn new(shutdown: CancellationToken) -> Self {
        Self { shutdown }
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> Task<C> for Terminal {
    fn name(&self) -> &str {
        "terminal_task"
    }

    async fn run(&self, _ctx: &TaskContext, _services: &C) -> Result<(), TaskError> {
        info!(target: "probevisor", "terminal task reached, stopping engine");
        self.shutdown.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_fires_shutdown_and_succeeds() {
        let shutdown = CancellationToken::new();
        let t = Terminal::new(shutdown.clone());
        let ctx = TaskContext::new(CancellationToken::new());

        Task::<()>::run(&t, &ctx, &()).await.unwrap();
        assert!(shutdown.is_cancelled());
        assert!(Task::<()>::registration(&t).is_empty());
    }
}
