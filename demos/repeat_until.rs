//! # Example: repeat_until
//!
//! Cycles two tasks until a shared budget runs out, with a short deadline
//! that cuts one of them off.
//!
//! Shows how to:
//! - Build a loop engine with [`EngineBuilder::build_repeat`].
//! - Bound runs with [`EngineConfig::task_timeout`] and observe the cancellation.
//! - Log events through the built-in [`LogWriter`].
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example repeat_until
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use probevisor::{
    EngineBuilder, EngineConfig, LogWriter, Subscribe, TaskContext, TaskError, TaskFn, TaskRef,
};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let rounds = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&rounds);
    let quick: TaskRef<()> = TaskFn::arc("quick", move |_: TaskContext| {
        let counter = Arc::clone(&counter);
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            println!("[quick] round {n}");
            Ok(())
        }
    });
    let slow: TaskRef<()> = TaskFn::arc("slow", |ctx: TaskContext| async move {
        tokio::select! {
            _ = ctx.cancelled() => {
                println!("[slow] deadline hit, {:?} left", ctx.remaining());
                Err(TaskError::Canceled)
            }
            _ = tokio::time::sleep(Duration::from_secs(5)) => Ok(()),
        }
    });

    let cfg = EngineConfig::default()
        .with_task_timeout(Duration::from_millis(300))
        .with_cancel_grace(Duration::from_millis(100));
    let budget = Arc::clone(&rounds);
    let engine = EngineBuilder::new(())
        .with_config(cfg)
        .with_subscribers(vec![Arc::new(LogWriter::new()) as Arc<dyn Subscribe>])
        .with_tasks(vec![quick, slow])
        .build_repeat(move || budget.load(Ordering::SeqCst) >= 3)?;

    let mut errors = engine.start(CancellationToken::new())?;
    while let Some(failure) = errors.recv().await {
        println!("[main] {failure}");
    }
    engine.wait().await;
    println!("[main] finished after {} rounds", rounds.load(Ordering::SeqCst));
    Ok(())
}
