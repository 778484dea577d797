//! # Event subscribers.
//!
//! ```text
//! Engine / Scheduler / EngineHandle ── publish(Event) ──► Bus
//!                                                          │
//!                                              subscriber listener (engine)
//!                                                          ▼
//!                                                   SubscriberSet::emit
//!                                            ┌─────────────┼─────────────┐
//!                                            ▼             ▼             ▼
//!                                        LogWriter   MetricsWriter    custom
//! ```
//!
//! - [`Subscribe`] - the extension trait
//! - [`SubscriberSet`] - bounded, panic-isolated fan-out
//! - [`LogWriter`] - events as `tracing` records
//! - [`MetricsWriter`] - one outcome observation per run

mod log;
mod metrics;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use metrics::MetricsWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
