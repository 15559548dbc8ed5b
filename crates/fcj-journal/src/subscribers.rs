//! Identifier-keyed registry of change callbacks.
//!
//! Notification itself lives in the journal façade: it snapshots the
//! callback list here, drops every lock, and only then invokes callbacks,
//! so a callback can re-enter the journal (including cancelling
//! subscribers) without deadlocking.

use std::collections::HashMap;
use std::sync::Arc;

/// Identifier for a registered subscriber.
///
/// Ids start at 1 per journal and are never reused.
pub type SubscriberId = u64;

/// Callback invoked on the recording thread after each journal change.
pub type SubscriberCallback = Arc<dyn Fn() + Send + Sync>;

pub(crate) struct SubscriberState {
    next_subscriber_id: SubscriberId,
    subscribers: HashMap<SubscriberId, SubscriberCallback>,
}

impl SubscriberState {
    pub(crate) fn new() -> Self {
        SubscriberState {
            next_subscriber_id: 1,
            subscribers: HashMap::new(),
        }
    }

    pub(crate) fn register(&mut self, callback: SubscriberCallback) -> SubscriberId {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        self.subscribers.insert(id, callback);
        id
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub(crate) fn cancel(&mut self, id: SubscriberId) {
        self.subscribers.remove(&id);
    }

    pub(crate) fn cancel_all(&mut self) {
        self.subscribers.clear();
    }

    pub(crate) fn is_valid(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }

    /// Copy of the current callback list, in unspecified order.
    pub(crate) fn snapshot(&self) -> Vec<SubscriberCallback> {
        self.subscribers.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_ids_are_monotonic_and_never_reused() {
        let mut state = SubscriberState::new();
        let a = state.register(Arc::new(|| {}));
        let b = state.register(Arc::new(|| {}));
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        state.cancel(a);
        let c = state.register(Arc::new(|| {}));
        assert_eq!(c, 3);
    }

    #[test]
    fn test_cancel_unknown_id_is_silent() {
        let mut state = SubscriberState::new();
        state.cancel(42);
        assert!(!state.is_valid(42));
    }

    #[test]
    fn test_cancel_all_clears_registry() {
        let mut state = SubscriberState::new();
        let a = state.register(Arc::new(|| {}));
        let b = state.register(Arc::new(|| {}));
        state.cancel_all();
        assert!(!state.is_valid(a));
        assert!(!state.is_valid(b));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_cancels() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut state = SubscriberState::new();
        let counter2 = Arc::clone(&counter);
        let id = state.register(Arc::new(move || {
            counter2.fetch_add(1, Ordering::SeqCst);
        }));
        let snapshot = state.snapshot();
        state.cancel(id);
        for callback in snapshot {
            callback();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
