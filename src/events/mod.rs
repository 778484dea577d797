//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the engine consumer loop, [`EngineHandle`](crate::EngineHandle),
//!   the cron [`Scheduler`](crate::Scheduler), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the engine's subscriber listener, which fans out to
//!   [`SubscriberSet`](crate::SubscriberSet).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
