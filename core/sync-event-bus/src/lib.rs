//! # Sync Event Bus
//!
//! In-process, type-keyed publish/subscribe with synchronous dispatch.
//!
//! ## Features
//!
//! - **Type Safety**: subscribers are keyed by the event value's type, with
//!   the static type reapplied at exactly one downcast point
//! - **Per-type locking**: traffic on one event type never blocks mutation
//!   or publishing on another
//! - **Snapshot dispatch**: publish copies the subscriber list under the
//!   per-type lock, then invokes with no lock held — callbacks may
//!   subscribe, unsubscribe (including themselves), or publish reentrantly
//! - **Failure isolation**: a panicking subscriber is reported to an
//!   injectable error sink and skipped, never aborting the rest of delivery
//! - **Lifecycle hygiene**: a type's list and lock are dropped the moment
//!   the last subscriber leaves
//!
//! ## Example
//!
//! ```rust
//! use sync_event_bus::EventBus;
//!
//! #[derive(Debug)]
//! struct OrderFilled { order_id: u64, quantity: u32 }
//!
//! let bus = EventBus::new();
//!
//! // Subscribe to fills
//! let id = bus.subscribe(|fill: &OrderFilled| {
//!     println!("filled {} x{}", fill.order_id, fill.quantity);
//! });
//!
//! // Publish; every current subscriber is invoked in subscription order
//! bus.publish(OrderFilled { order_id: 7, quantity: 100 });
//!
//! // Explicit removal; dropping the last subscriber removes the type entry
//! bus.unsubscribe::<OrderFilled>(id);
//! assert!(!bus.has_subscribers::<OrderFilled>());
//! ```

pub mod bus;
pub mod error;
pub mod subscriber;

// Internal: storage and invocation split, dispatch depends on storage
mod dispatcher;
mod registry;

// Re-exports
pub use bus::{EventBus, EventStats};
pub use error::{BusError, ErrorSink, FailureReport, TracingSink};
pub use subscriber::{Subscription, SubscriptionGuard, SubscriptionId};
