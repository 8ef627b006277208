//! Core event bus implementation

use std::any::TypeId;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::dispatcher::Dispatcher;
use crate::error::{ErrorSink, TracingSink};
use crate::registry::Registry;
use crate::subscriber::{Subscription, SubscriptionGuard, SubscriptionId};

/// In-process event bus: type-keyed pub/sub with synchronous dispatch.
///
/// # Design
/// - Subscriber lists keyed by `TypeId`, one lock per event type
/// - Publish copies a snapshot under the per-type lock, then invokes every
///   entry with no lock held
/// - A panicking subscriber is reported to the error sink and skipped; it
///   never aborts delivery to the rest or surfaces to the publisher
///
/// Cloning the bus yields another handle to the same registry (teacher
/// pattern for sharing across threads). There is no ambient global instance;
/// pass the bus to whoever needs it, and construct a fresh one per test.
///
/// # Example
/// ```
/// use sync_event_bus::EventBus;
///
/// #[derive(Debug)]
/// struct PriceTick { symbol: &'static str, price: f64 }
///
/// let bus = EventBus::new();
/// let id = bus.subscribe(|tick: &PriceTick| {
///     println!("{} @ {}", tick.symbol, tick.price);
/// });
///
/// bus.publish(PriceTick { symbol: "ES", price: 6000.0 });
/// bus.unsubscribe::<PriceTick>(id);
/// ```
pub struct EventBus {
    /// Subscriber lists indexed by TypeId
    registry: Arc<Registry>,

    /// Invocation loop and failure routing
    dispatcher: Arc<Dispatcher>,

    /// Statistics
    stats: Arc<DashMap<TypeId, TypeStats>>,
}

/// Cumulative per-type delivery counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventStats {
    pub published: u64,
    pub delivered: u64,
    pub failed: u64,
}

#[derive(Debug, Clone)]
struct TypeStats {
    name: &'static str,
    stats: EventStats,
}

impl EventBus {
    /// Create a bus that logs subscriber failures through `tracing`
    pub fn new() -> Self {
        Self::with_error_sink(Arc::new(TracingSink))
    }

    /// Create a bus with an injected failure sink
    pub fn with_error_sink(sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            registry: Arc::new(Registry::new()),
            dispatcher: Arc::new(Dispatcher::new(sink)),
            stats: Arc::new(DashMap::new()),
        }
    }

    /// Register `callback` for every future publish of `E`.
    ///
    /// The list (and its lock) is created on first subscribe; concurrent
    /// first-subscribers for the same type land in one list. Returns the id
    /// to pass to [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<E: 'static>(
        &self,
        callback: impl Fn(&E) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let subscription = Subscription::new(callback);
        let id = subscription.id();
        self.registry.insert(subscription);
        id
    }

    /// Subscribe and get a guard that unsubscribes on drop
    pub fn subscribe_scoped<E: 'static>(
        &self,
        callback: impl Fn(&E) + Send + Sync + 'static,
    ) -> SubscriptionGuard {
        let id = self.subscribe(callback);
        SubscriptionGuard::new(self.clone(), TypeId::of::<E>(), id)
    }

    /// Remove one subscription of `E`.
    ///
    /// Deletes the type's whole entry once its list empties. Unknown id or
    /// never-subscribed type is a no-op; the return value says whether
    /// anything was removed.
    pub fn unsubscribe<E: 'static>(&self, id: SubscriptionId) -> bool {
        self.unsubscribe_raw(TypeId::of::<E>(), id)
    }

    pub(crate) fn unsubscribe_raw(&self, type_id: TypeId, id: SubscriptionId) -> bool {
        self.registry.remove(type_id, id)
    }

    /// Remove every subscriber of `E`; other types are untouched
    pub fn unsubscribe_all<E: 'static>(&self) {
        self.registry.remove_all(TypeId::of::<E>());
    }

    /// Remove every subscriber of every type.
    ///
    /// Safe to call while subscribes and publishes are in flight: each entry
    /// disappears atomically, and in-flight dispatches finish against the
    /// snapshot they already hold.
    pub fn clear_all(&self) {
        self.registry.clear();
    }

    /// Deliver `event` to everyone subscribed to `E` at this instant.
    ///
    /// Snapshot semantics: subscribers added during dispatch do not receive
    /// this value; a subscriber removed during dispatch may still receive it.
    /// Publishing with zero subscribers is a no-op, and subscriber failures
    /// never reach the publisher.
    pub fn publish<E: 'static>(&self, event: E) {
        let snapshot = self.registry.snapshot::<E>();
        if snapshot.is_empty() {
            return;
        }

        // No registry lock is held past this point; callbacks may freely
        // subscribe, unsubscribe, or publish reentrantly.
        let outcome = self.dispatcher.dispatch(&snapshot, &event);

        self.stats
            .entry(TypeId::of::<E>())
            .or_insert_with(|| TypeStats {
                name: std::any::type_name::<E>(),
                stats: EventStats::default(),
            })
            .value_mut()
            .stats
            .apply(|s| {
                s.published += 1;
                s.delivered += outcome.delivered;
                s.failed += outcome.failed;
            });
    }

    /// Current subscriber count for `E`
    pub fn count<E: 'static>(&self) -> usize {
        self.registry.len_of(TypeId::of::<E>())
    }

    /// Subscriber count across every type
    pub fn total_count(&self) -> usize {
        self.registry.total_len()
    }

    /// Whether `E` currently has at least one subscriber
    pub fn has_subscribers<E: 'static>(&self) -> bool {
        self.count::<E>() > 0
    }

    /// Cumulative delivery stats for `E`, if it was ever published
    pub fn stats<E: 'static>(&self) -> Option<EventStats> {
        self.stats
            .get(&TypeId::of::<E>())
            .map(|entry| entry.stats.clone())
    }

    /// Delivery stats for every published type, keyed by type name
    pub fn all_stats(&self) -> Vec<(String, EventStats)> {
        self.stats
            .iter()
            .map(|entry| (entry.name.to_string(), entry.stats.clone()))
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            dispatcher: self.dispatcher.clone(),
            stats: self.stats.clone(),
        }
    }
}

trait Apply {
    fn apply<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self);
}

impl Apply for EventStats {
    fn apply<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        f(self);
    }
}
