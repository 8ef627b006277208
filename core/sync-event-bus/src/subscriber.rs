//! Subscription identity and handle types

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::EventBus;

/// Unique identity of one subscription, used for removal.
///
/// Two subscriptions of the same closure get distinct ids, so duplicate
/// subscriptions are permitted and independently removable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn next() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(1);

        // Monotonic counter folded into a UUID (avoids OS RNG syscall)
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(Uuid::from_u128(seq as u128))
    }

    /// Raw UUID backing this id
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One registered callback for event type `E`.
///
/// The callback is reference-counted, not owned: removing the registry entry
/// releases the registry's reference only.
pub struct Subscription<E> {
    pub(crate) id: SubscriptionId,
    pub(crate) callback: Arc<dyn Fn(&E) + Send + Sync>,
}

impl<E> Subscription<E> {
    pub(crate) fn new(callback: impl Fn(&E) + Send + Sync + 'static) -> Self {
        Self {
            id: SubscriptionId::next(),
            callback: Arc::new(callback),
        }
    }

    /// Identity of this subscription
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl<E> Clone for Subscription<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: self.callback.clone(),
        }
    }
}

impl<E> fmt::Debug for Subscription<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// RAII handle that unsubscribes when dropped.
///
/// Returned by [`EventBus::subscribe_scoped`]. Tie the guard's lifetime to the
/// owner of the callback's captured state and the subscription can never
/// outlive it.
///
/// # Example
/// ```
/// use sync_event_bus::EventBus;
///
/// let bus = EventBus::new();
/// {
///     let _guard = bus.subscribe_scoped(|n: &u32| println!("got {n}"));
///     assert_eq!(bus.count::<u32>(), 1);
/// }
/// assert_eq!(bus.count::<u32>(), 0);
/// ```
#[must_use = "dropping the guard immediately unsubscribes"]
pub struct SubscriptionGuard {
    bus: EventBus,
    type_id: TypeId,
    id: SubscriptionId,
}

impl SubscriptionGuard {
    pub(crate) fn new(bus: EventBus, type_id: TypeId, id: SubscriptionId) -> Self {
        Self { bus, type_id, id }
    }

    /// Identity of the guarded subscription
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Unsubscribe now instead of at drop
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe_raw(self.type_id, self.id);
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = SubscriptionId::next();
        let b = SubscriptionId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_subscription_clone_shares_identity() {
        let sub = Subscription::new(|_: &u32| {});
        let copy = sub.clone();
        assert_eq!(sub.id(), copy.id());
    }
}
