//! Download progress notifications.

use drl_core::DownloadProgress;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

type ProgressCallback = Box<dyn Fn(&DownloadProgress) + Send + Sync>;

/// Identifier of a registered progress subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Multicast of [`DownloadProgress`] events to registered callbacks.
///
/// Callbacks run sequentially on the task that emits the event. A panicking
/// subscriber is logged and does not prevent the others from running.
#[derive(Default)]
pub struct ProgressNotifier {
    subscribers: RwLock<HashMap<u64, ProgressCallback>>,
    next_id: AtomicU64,
}

impl ProgressNotifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback, returning the handle needed to remove it.
    pub fn subscribe(
        &self,
        callback: impl Fn(&DownloadProgress) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Box::new(callback));
        SubscriptionId(id)
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id.0)
            .is_some()
    }

    /// Deliver an event to every subscriber in registration order.
    pub fn emit(&self, progress: &DownloadProgress) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for (id, callback) in subscribers.iter() {
            if catch_unwind(AssertUnwindSafe(|| callback(progress))).is_err() {
                tracing::warn!(subscriber = id, "download progress subscriber panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drl_core::SyncStatus;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn progress() -> DownloadProgress {
        DownloadProgress::from_status(&SyncStatus::default(), false)
    }

    #[test]
    fn test_subscribers_receive_events() {
        let notifier = ProgressNotifier::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_cb = seen.clone();
        let id = notifier.subscribe(move |_| {
            seen_cb.fetch_add(1, Ordering::SeqCst);
        });

        notifier.emit(&progress());
        notifier.emit(&progress());
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        assert!(notifier.unsubscribe(id));
        notifier.emit(&progress());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(!notifier.unsubscribe(id));
    }

    #[test]
    fn test_panicking_subscriber_does_not_stop_others() {
        let notifier = ProgressNotifier::new();
        let seen = Arc::new(AtomicUsize::new(0));

        notifier.subscribe(|_| panic!("subscriber bug"));
        let seen_cb = seen.clone();
        notifier.subscribe(move |_| {
            seen_cb.fetch_add(1, Ordering::SeqCst);
        });

        notifier.emit(&progress());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
