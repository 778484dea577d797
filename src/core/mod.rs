//! Runtime core: the engine and its consumer loop.
//!
//! - [`Engine`]: owns the queue, optional scheduler and service handles; runs the consumer loop;
//! - [`EngineBuilder`]: wires an engine in continuous, batch or loop mode;
//! - [`EngineHandle`]: cloneable enqueue/shutdown access used by repeat constructs;
//! - `runner`: executes one run under its deadline and publishes lifecycle events;
//! - [`wait_for_shutdown_signal`]: cross-platform OS signal helper.

mod builder;
mod engine;
mod handle;
mod runner;
mod shutdown;

pub use builder::EngineBuilder;
pub use engine::{Engine, EngineState};
pub use handle::{EngineHandle, WeakHandle};
pub use shutdown::wait_for_shutdown_signal;
