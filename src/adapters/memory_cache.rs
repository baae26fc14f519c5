//! In-memory [`TransferCache`] for the composition root.
//!
//! Observers are called synchronously from `set`, outside the cache lock, so
//! an observer may read the cache (or subscribe) without deadlocking.
//!
//! Values are never evicted on their own. A finished transfer stays as a cold
//! entry after its last observer leaves, so a later `begin` does not replay
//! it; memory grows with the number of distinct identities until callers
//! drop entries through [`SessionRegistry::invalidate`]. Long-lived
//! processes that follow many transfers should invalidate finished ones once
//! they have been shown.
//!
//! [`SessionRegistry::invalidate`]: crate::transfer::SessionRegistry::invalidate

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::traits::{Observer, Subscription, TransferCache};
use crate::transfer::{TransferIdentity, TransferState};

#[derive(Default)]
struct CacheEntry {
    value: Option<TransferState>,
    observers: Vec<(u64, Observer)>,
}

impl CacheEntry {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.observers.is_empty()
    }
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<TransferIdentity, CacheEntry>,
    next_observer_id: u64,
}

/// Thread-safe cache of published transfer states.
///
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys that currently hold a value.
    pub fn len(&self) -> usize {
        lock(&self.inner)
            .entries
            .values()
            .filter(|entry| entry.value.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("len", &self.len())
            .finish()
    }
}

fn lock(inner: &Mutex<CacheInner>) -> MutexGuard<'_, CacheInner> {
    // A panicking observer never runs under this lock, so the data is intact.
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TransferCache for InMemoryCache {
    fn get(&self, key: &TransferIdentity) -> Option<TransferState> {
        lock(&self.inner)
            .entries
            .get(key)
            .and_then(|entry| entry.value.clone())
    }

    fn set(&self, key: &TransferIdentity, value: TransferState) {
        let observers: Vec<Observer> = {
            let mut inner = lock(&self.inner);
            let entry = inner.entries.entry(key.clone()).or_default();
            entry.value = Some(value.clone());
            entry.observers.iter().map(|(_, o)| o.clone()).collect()
        };

        for observer in observers {
            observer(&value);
        }
    }

    fn remove(&self, key: &TransferIdentity) {
        let mut inner = lock(&self.inner);
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.value = None;
            if entry.is_empty() {
                inner.entries.remove(key);
            }
        }
    }

    fn subscribe(&self, key: &TransferIdentity, observer: Observer) -> Subscription {
        let id = {
            let mut inner = lock(&self.inner);
            let id = inner.next_observer_id;
            inner.next_observer_id += 1;
            inner
                .entries
                .entry(key.clone())
                .or_default()
                .observers
                .push((id, observer));
            id
        };

        let weak: Weak<Mutex<CacheInner>> = Arc::downgrade(&self.inner);
        let key = key.clone();
        Subscription::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut inner = lock(&inner);
            if let Some(entry) = inner.entries.get_mut(&key) {
                entry.observers.retain(|(observer_id, _)| *observer_id != id);
                if entry.is_empty() {
                    inner.entries.remove(&key);
                }
            }
        })
    }

    fn observer_count(&self, key: &TransferIdentity) -> usize {
        lock(&self.inner)
            .entries
            .get(key)
            .map(|entry| entry.observers.len())
            .unwrap_or(0)
    }
}
