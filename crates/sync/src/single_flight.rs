//! Single-flight task coordination.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Mutex, PoisonError};

/// A mutex-guarded slot holding the currently running task as a shareable
/// future.
///
/// At most one task runs per epoch: callers either install a new future or
/// attach to the in-flight one, and every caller of the same epoch observes
/// the identical output. The slot is cleared once the task completes so the
/// next caller starts fresh.
pub struct SingleFlight<T: Clone> {
    slot: Mutex<Option<Shared<BoxFuture<'static, T>>>>,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Attach to the in-flight future, or install the one produced by
    /// `start`. Returns the shared future and whether this call started a new
    /// epoch.
    pub fn join_or_start<F>(&self, start: F) -> (Shared<BoxFuture<'static, T>>, bool)
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = slot.as_ref()
            && existing.peek().is_none()
        {
            return (existing.clone(), false);
        }
        let fut = start().shared();
        *slot = Some(fut.clone());
        (fut, true)
    }

    /// Clear the slot if its task has completed.
    pub fn clear_finished(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|fut| fut.peek().is_some()) {
            *slot = None;
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrent_callers_share_one_epoch() {
        let flight = Arc::new(SingleFlight::<usize>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let (notify_tx, notify_rx) = tokio::sync::oneshot::channel::<()>();
        let runs_task = runs.clone();
        let (first, started) = flight.join_or_start(move || {
            async move {
                let _ = notify_rx.await;
                runs_task.fetch_add(1, Ordering::SeqCst)
            }
            .boxed()
        });
        assert!(started);

        // While the first task is pending, every joiner attaches to it.
        let (second, started) = flight.join_or_start(|| async { 99 }.boxed());
        assert!(!started);

        notify_tx.send(()).unwrap();
        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, b);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_completed_epoch_is_replaced() {
        let flight = SingleFlight::<u32>::new();

        let (fut, started) = flight.join_or_start(|| async { 1 }.boxed());
        assert!(started);
        assert_eq!(fut.await, 1);

        // The finished future still occupies the slot; the next caller must
        // get a fresh epoch either way.
        let (fut, started) = flight.join_or_start(|| async { 2 }.boxed());
        assert!(started);
        assert_eq!(fut.await, 2);

        flight.clear_finished();
        let (fut, started) = flight.join_or_start(|| async { 3 }.boxed());
        assert!(started);
        assert_eq!(fut.await, 3);
    }
}
