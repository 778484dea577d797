//! # Event subscriber trait.
//!
//! Provides [`Subscribe`], the extension point for plugging observers into the
//! engine: logging, outcome metrics, alerting.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** fed by a **bounded queue** ([`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::SubscriberPanicked`)
//!
//! A slow subscriber only affects its own queue; overflow drops the event for
//! that subscriber and publishes `EventKind::SubscriberOverflow`.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use probevisor::{Event, EventKind, Subscribe};
//!
//! struct Pager;
//!
//! #[async_trait]
//! impl Subscribe for Pager {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::TimeoutHit) {
//!             // page someone
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "pager" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event subscriber for engine observability.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event, in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events. Prefer short names.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Capacity of this subscriber's queue (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
