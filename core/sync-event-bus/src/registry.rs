//! Per-type subscriber storage
//!
//! This module owns the mapping from event type to subscriber list and the
//! locks protecting it. Dispatch never happens here; the registry only hands
//! out consistent snapshots.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::subscriber::{Subscription, SubscriptionId};

/// Type-erased view of one event type's subscriber list.
///
/// Lets the registry remove, count, and drop entries without knowing the
/// event type; only `subscribe` and `snapshot` reapply the static type via
/// `as_any` downcast.
pub(crate) trait AnyList: Any + Send + Sync {
    fn remove(&self, id: SubscriptionId) -> bool;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
}

/// Subscriber list for one event type, in subscription order.
///
/// The mutex is the per-type lock: held only for list mutation or snapshot
/// copy, never across a callback invocation.
pub(crate) struct TypedList<E> {
    subscribers: Mutex<Vec<Subscription<E>>>,
}

impl<E: 'static> TypedList<E> {
    fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<E: 'static> AnyList for TypedList<E> {
    fn remove(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        match subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                // Vec::remove keeps the delivery order of the rest intact
                subscribers.remove(index);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Subscriber registry keyed by `TypeId`.
///
/// # Design
/// - One list + lock pair per event type, created lazily on first subscribe
/// - An entry is removed the moment its list empties, so presence in the map
///   implies at least one subscriber
/// - Mutations hold the map entry guard across the list update; lock order is
///   always map entry first, list mutex second
pub(crate) struct Registry {
    entries: DashMap<TypeId, Arc<dyn AnyList>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Append a subscription to `E`'s list, creating the list if absent.
    ///
    /// The entry guard stays held across the push so a concurrent
    /// empty-entry removal can never orphan the list being pushed into.
    pub(crate) fn insert<E: 'static>(&self, subscription: Subscription<E>) {
        let entry = self.entries.entry(TypeId::of::<E>()).or_insert_with(|| {
            debug!(
                "Creating subscriber list for event type: {}",
                std::any::type_name::<E>()
            );
            Arc::new(TypedList::<E>::new()) as Arc<dyn AnyList>
        });

        entry
            .value()
            .as_any()
            .downcast_ref::<TypedList<E>>()
            .expect("Type mismatch in subscriber registry")
            .subscribers
            .lock()
            .push(subscription);
    }

    /// Remove one subscription by id. Deletes the whole entry (list and lock)
    /// if the removal empties the list. No-op when the type or id is unknown.
    pub(crate) fn remove(&self, type_id: TypeId, id: SubscriptionId) -> bool {
        match self.entries.entry(type_id) {
            Entry::Occupied(entry) => {
                let removed = entry.get().remove(id);
                if removed && entry.get().len() == 0 {
                    debug!("Removing empty subscriber list for {:?}", type_id);
                    entry.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Drop `E`'s entire entry if present
    pub(crate) fn remove_all(&self, type_id: TypeId) -> bool {
        self.entries.remove(&type_id).is_some()
    }

    /// Drop every entry for every type.
    ///
    /// Each shard is cleared under its own write lock, so a concurrent
    /// operation sees any given entry either fully present or fully absent.
    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    /// Ordered copy of `E`'s current subscriber list, empty if absent.
    ///
    /// Taken under the per-type lock, so the copy reflects one consistent
    /// point in time. The lock is released before the caller invokes anything.
    pub(crate) fn snapshot<E: 'static>(&self) -> Vec<Subscription<E>> {
        match self.entries.get(&TypeId::of::<E>()) {
            Some(entry) => entry
                .value()
                .as_any()
                .downcast_ref::<TypedList<E>>()
                .expect("Type mismatch in subscriber registry")
                .subscribers
                .lock()
                .clone(),
            None => Vec::new(),
        }
    }

    /// Subscriber count for one type
    pub(crate) fn len_of(&self, type_id: TypeId) -> usize {
        self.entries.get(&type_id).map_or(0, |entry| entry.len())
    }

    /// Subscriber count across all types
    pub(crate) fn total_len(&self) -> usize {
        self.entries.iter().map(|entry| entry.value().len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop<E>() -> Subscription<E> {
        Subscription::new(|_: &E| {})
    }

    #[test]
    fn test_insert_creates_entry_lazily() {
        let registry = Registry::new();
        assert_eq!(registry.len_of(TypeId::of::<u32>()), 0);

        registry.insert(noop::<u32>());
        assert_eq!(registry.len_of(TypeId::of::<u32>()), 1);
        assert_eq!(registry.len_of(TypeId::of::<String>()), 0);
    }

    #[test]
    fn test_remove_last_subscriber_drops_entry() {
        let registry = Registry::new();
        let sub = noop::<u32>();
        let id = sub.id();
        registry.insert(sub);

        assert!(registry.remove(TypeId::of::<u32>(), id));
        assert_eq!(registry.total_len(), 0);
        // Entry is gone entirely, not an empty list
        assert!(registry.entries.get(&TypeId::of::<u32>()).is_none());
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let registry = Registry::new();
        registry.insert(noop::<u32>());

        assert!(!registry.remove(TypeId::of::<u32>(), SubscriptionId::next()));
        assert!(!registry.remove(TypeId::of::<String>(), SubscriptionId::next()));
        assert_eq!(registry.len_of(TypeId::of::<u32>()), 1);
    }

    #[test]
    fn test_remove_keeps_subscription_order() {
        let registry = Registry::new();
        let first = noop::<u32>();
        let second = noop::<u32>();
        let third = noop::<u32>();
        let second_id = second.id();
        let ids = (first.id(), third.id());

        registry.insert(first);
        registry.insert(second);
        registry.insert(third);
        registry.remove(TypeId::of::<u32>(), second_id);

        let snapshot = registry.snapshot::<u32>();
        let remaining: Vec<_> = snapshot.iter().map(|s| s.id()).collect();
        assert_eq!(remaining, vec![ids.0, ids.1]);
    }

    #[test]
    fn test_snapshot_of_absent_type_is_empty() {
        let registry = Registry::new();
        assert!(registry.snapshot::<u32>().is_empty());
    }

    #[test]
    fn test_duplicate_closure_gets_two_entries() {
        let registry = Registry::new();
        let callback = |_: &u32| {};
        registry.insert(Subscription::new(callback));
        registry.insert(Subscription::new(callback));

        assert_eq!(registry.len_of(TypeId::of::<u32>()), 2);
    }

    #[test]
    fn test_remove_all_leaves_other_types_alone() {
        let registry = Registry::new();
        registry.insert(noop::<u32>());
        registry.insert(noop::<String>());

        assert!(registry.remove_all(TypeId::of::<u32>()));
        assert_eq!(registry.len_of(TypeId::of::<u32>()), 0);
        assert_eq!(registry.len_of(TypeId::of::<String>()), 1);
        assert!(!registry.remove_all(TypeId::of::<u32>()));
    }

    #[test]
    fn test_clear_drops_everything() {
        let registry = Registry::new();
        registry.insert(noop::<u32>());
        registry.insert(noop::<String>());

        registry.clear();
        assert_eq!(registry.total_len(), 0);
    }
}
