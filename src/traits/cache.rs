//! Keyed state cache with change subscriptions.
//!
//! The UI-state layer owns the cache; transfer sessions only publish into it
//! and observers only read from it. Session correctness (one stream per key,
//! no replay of finished transfers) relies on `get` returning the last `set`.

use std::fmt;
use std::sync::Arc;

use crate::transfer::{TransferIdentity, TransferState};

/// Callback invoked with each newly published state for a key.
pub type Observer = Arc<dyn Fn(&TransferState) + Send + Sync>;

/// Cache of published transfer states.
pub trait TransferCache: Send + Sync {
    /// Current value for `key`, if any.
    fn get(&self, key: &TransferIdentity) -> Option<TransferState>;

    /// Store `value` and notify every observer of `key`.
    fn set(&self, key: &TransferIdentity, value: TransferState);

    /// Drop the value for `key`. Observers stay registered.
    fn remove(&self, key: &TransferIdentity);

    /// Register `observer` for future values of `key`.
    fn subscribe(&self, key: &TransferIdentity, observer: Observer) -> Subscription;

    /// Number of observers currently registered for `key`.
    fn observer_count(&self, key: &TransferIdentity) -> usize;
}

/// Handle for a registered observer.
///
/// The observer is removed when the subscription is dropped or
/// [`unsubscribe`](Self::unsubscribe) is called.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
