//! # probevisor
//!
//! **Probevisor** is the scheduling and dispatch core of a gateway monitor.
//!
//! It runs a set of independent, long-running probes ("tasks") against a
//! remote service, periodically (cron) and on demand, strictly one at a time,
//! each bounded by a per-run deadline. Failures are reported on an error
//! stream; the engine never retries and never stops because of them.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Scheduler   │   │ EngineHandle │   │ Repeat /     │
//!     │ (cron loops) │   │  add_task()  │   │ Terminal     │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            └───────── push ───┼──────────────────┘
//!                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TaskQueue (FIFO + dedup by instance, length gauge, reject count) │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼  Subscription (notify + poll)
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Engine consumer loop (one per engine)                            │
//! │  - run_once(task, services, ctx + deadline)                       │
//! │  - Err ──► error stream (TaskFailure)                             │
//! │  - shutdown token observed between runs                           │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                │ publishes TaskStarting / TaskStopped /
//!                                │ TaskFailed / TimeoutHit / ...
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//!                       subscriber listener
//!                                ▼
//!                          SubscriberSet
//!                      ┌─────────┼─────────┐
//!                      ▼         ▼         ▼
//!                  LogWriter  MetricsWriter  custom
//! ```
//!
//! ### Modes
//! ```text
//! continuous   EngineBuilder::build()          cron firings feed the queue until stop()
//! batch        EngineBuilder::build_single()   [A, B, C, terminal] then the stream closes
//! loop         EngineBuilder::build_repeat(f)  [repeat] re-enqueues [A, B, C, repeat] until f()
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                        |
//! |-------------------|-----------------------------------------------------------|-------------------------------------------|
//! | **Tasks**         | Deadline-bounded async probes over shared services.       | [`Task`], [`TaskRef`], [`TaskFn`]         |
//! | **Queue**         | Ordered, deduplicating buffer with a continuous feed.     | [`TaskQueue`], [`Subscription`]           |
//! | **Scheduling**    | Cron expressions (five to seven fields) to queue pushes.  | [`Scheduler`]                             |
//! | **Engine**        | Single consumer, error stream, controlled shutdown.       | [`Engine`], [`EngineBuilder`]             |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, alerting).  | [`Subscribe`], [`LogWriter`]              |
//! | **Metrics**       | Explicit registry, Prometheus text exposition.            | [`Registry`], [`metrics`]                 |
//! | **Errors**        | Typed errors for orchestration and task execution.        | [`TaskError`], [`RuntimeError`]           |
//!
//! ## Optional features
//! - `probes`: the IPFS gateway probes ([`probes`]) and their `Gateway` service bundle.
//! - `cli`: the `gateway-monitor` binary.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use tokio_util::sync::CancellationToken;
//! use probevisor::{EngineBuilder, TaskContext, TaskFn, TaskRef};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rounds = Arc::new(AtomicUsize::new(0));
//!     let counter = Arc::clone(&rounds);
//!     let probe: TaskRef<()> = TaskFn::arc("probe", move |_: TaskContext| {
//!         let counter = Arc::clone(&counter);
//!         async move {
//!             counter.fetch_add(1, Ordering::SeqCst);
//!             Ok(())
//!         }
//!     });
//!
//!     let seen = Arc::clone(&rounds);
//!     let engine = EngineBuilder::new(())
//!         .with_tasks(vec![probe])
//!         .build_repeat(move || seen.load(Ordering::SeqCst) >= 3)?;
//!
//!     let mut errors = engine.start(CancellationToken::new())?;
//!     while let Some(failure) = errors.recv().await {
//!         eprintln!("{failure}");
//!     }
//!     assert_eq!(rounds.load(Ordering::SeqCst), 3);
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod queue;
mod subscribers;
mod tasks;

pub mod metrics;
pub mod scheduler;

#[cfg(feature = "probes")]
pub mod probes;

// ---- Public re-exports ----

pub use config::EngineConfig;
pub use core::{
    Engine, EngineBuilder, EngineHandle, EngineState, WeakHandle, wait_for_shutdown_signal,
};
pub use error::{MetricsError, RuntimeError, TaskError, TaskFailure};
pub use events::{Bus, Event, EventKind};
pub use metrics::Registry;
pub use queue::{DEFAULT_POLL_INTERVAL, Subscription, TaskQueue};
pub use scheduler::Scheduler;
pub use subscribers::{LogWriter, MetricsWriter, Subscribe, SubscriberSet};
pub use tasks::{Registration, Repeat, Task, TaskContext, TaskFn, TaskRef, Terminal};
