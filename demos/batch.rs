//! # Example: batch
//!
//! Runs three tasks once, in order, then stops.
//!
//! Shows how to:
//! - Build a batch engine with [`EngineBuilder::build_single`].
//! - Read failures from the error stream until it closes.
//! - Attach a custom [`Subscribe`] implementation.
//!
//! ## Flow
//! ```text
//! queue: [fetch, parse, flaky, terminal_task]
//!     ├─► fetch   → Ok
//!     ├─► parse   → Ok
//!     ├─► flaky   → Err ──► error stream
//!     └─► terminal_task → shutdown ──► error stream closes
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example batch
//! ```

use std::sync::Arc;
use std::time::Duration;

use probevisor::{
    EngineBuilder, Event, EventKind, Subscribe, TaskContext, TaskError, TaskFn, TaskRef,
};
use tokio_util::sync::CancellationToken;

/// Prints finished runs with their duration.
struct Console;

#[async_trait::async_trait]
impl Subscribe for Console {
    async fn on_event(&self, ev: &Event) {
        let task = ev.task.as_deref().unwrap_or("<unknown>");
        match ev.kind {
            EventKind::TaskStopped => println!("[sub] ok:     {task} ({:?})", ev.elapsed()),
            EventKind::TaskFailed => println!(
                "[sub] failed: {task} reason={}",
                ev.reason.as_deref().unwrap_or("<none>")
            ),
            EventKind::EngineStopped => println!("[sub] engine stopped"),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

fn step(name: &'static str, ms: u64) -> TaskRef<()> {
    TaskFn::arc(name, move |ctx: TaskContext| async move {
        tokio::select! {
            _ = ctx.cancelled() => Err(TaskError::Canceled),
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let flaky: TaskRef<()> = TaskFn::arc("flaky", |_: TaskContext| async {
        Err(TaskError::fail("upstream returned 502"))
    });

    let engine = EngineBuilder::new(())
        .with_subscribers(vec![Arc::new(Console) as Arc<dyn Subscribe>])
        .with_tasks(vec![step("fetch", 150), step("parse", 50), flaky])
        .build_single()?;

    let mut errors = engine.start(CancellationToken::new())?;
    while let Some(failure) = errors.recv().await {
        println!("[main] {failure}");
    }
    engine.wait().await;
    Ok(())
}
