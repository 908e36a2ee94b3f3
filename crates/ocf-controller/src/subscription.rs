use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifier of a subscription.
///
/// It is returned when a handler is registered and it is needed to remove
/// that handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

// Handlers are run in registration order. They are cloned out of the lock
// before being called, so a handler may subscribe or unsubscribe.
pub(crate) struct Subscribers<T> {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
}

impl<T> std::fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscribers")
            .field("count", &self.len())
            .finish()
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Subscribers<T> {
    pub(crate) const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            handlers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(handler)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let len = handlers.len();
        handlers.retain(|(handler_id, _)| *handler_id != id);
        handlers.len() != len
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn notify(&self, value: &T) {
        let handlers: Vec<Handler<T>> = self
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(value);
        }
    }

    // A panicking handler never runs while the lock is held, the list is
    // always consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Handler<T>)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
