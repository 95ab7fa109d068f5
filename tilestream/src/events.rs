//! Synchronous observer registry.
//!
//! Observers run on the thread that triggered the change, after the
//! registry lock is released, so an observer may subscribe or unsubscribe
//! without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Handle returned by [`Observers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Observers<T> {
    next_id: AtomicU64,
    observers: RwLock<Vec<(SubscriptionId, Observer<T>)>>,
}

impl<T> Observers<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Calls every observer in subscription order.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Observer<T>> = self
            .observers
            .read()
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in snapshot {
            observer(value);
        }
    }
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_notify_reaches_all_observers() {
        let observers = Observers::<u32>::new();
        let sum = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let sum = Arc::clone(&sum);
            observers.subscribe(move |v| {
                sum.fetch_add(*v as usize, Ordering::SeqCst);
            });
        }
        observers.notify(&5);
        assert_eq!(sum.load(Ordering::SeqCst), 15);
    }

    #[test]
    fn test_unsubscribe() {
        let observers = Observers::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let id = observers.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.notify(&());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_observer_may_subscribe_during_notify() {
        let observers = Arc::new(Observers::<()>::new());
        let inner = Arc::clone(&observers);
        observers.subscribe(move |_| {
            inner.subscribe(|_| {});
        });
        observers.notify(&());
        assert_eq!(observers.len(), 2);
    }
}
