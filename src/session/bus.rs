//! Event Bus.
//!
//! In-process publish/subscribe keyed by [`EventKind`]. Callbacks run in
//! registration order. A panicking callback is caught and logged; the
//! remaining callbacks for the same event still run.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{error, trace};

use crate::identifiers::SubscriptionId;

use super::event::{EventKind, SessionEvent};

// ============================================================================
// Types
// ============================================================================

/// Subscriber callback.
pub type EventCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Registered callbacks per kind, in registration order.
type SubscriberMap = FxHashMap<EventKind, Vec<(SubscriptionId, EventCallback)>>;

// ============================================================================
// EventBus
// ============================================================================

/// Typed observer registry.
///
/// Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<SubscriberMap>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for events of `kind`.
    ///
    /// Returns the handle needed to unsubscribe.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::generate();
        self.subscribers
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Removes a registration.
    ///
    /// Returns `false` if it was not registered under `kind`.
    pub fn unsubscribe(&self, kind: &EventKind, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();

        let Some(list) = subscribers.get_mut(kind) else {
            return false;
        };

        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;

        if list.is_empty() {
            subscribers.remove(kind);
        }

        removed
    }

    /// Delivers `event` to every callback registered for its kind.
    ///
    /// Returns the number of callbacks that completed without panicking.
    pub fn notify(&self, event: &SessionEvent) -> usize {
        let kind = event.kind();

        // Snapshot so callbacks may (un)subscribe without deadlocking.
        let callbacks: Vec<EventCallback> = match self.subscribers.lock().get(&kind) {
            Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    error!(?kind, %reason, "Event subscriber panicked");
                }
            }
        }

        trace!(?kind, delivered, "Event published");
        delivered
    }

    /// Number of callbacks registered for `kind`.
    #[must_use]
    pub fn subscribers_for(&self, kind: &EventKind) -> usize {
        self.subscribers.lock().get(kind).map_or(0, Vec::len)
    }

    /// Total number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().values().map(Vec::len).sum()
    }
}

/// Extracts a printable reason from a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
