//! Typed synchronous event fan-out
//!
//! An [`Emitter`] keeps an ordered list of listeners. [`Emitter::fire`] calls them
//! in registration order on the caller's task. Registering a listener returns a
//! [`Subscription`] that unregisters it when disposed or dropped.
//!
//! [`Disposables`] groups subscriptions (and arbitrary cleanup closures) so a
//! whole set can be torn down at once, e.g. when the focused session changes.
//!
//! ```
//! use dapctl_core::Emitter;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let emitter = Emitter::<u32>::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = seen.clone();
//! let subscription = emitter.on(move |value| {
//!     counter.fetch_add(*value as usize, Ordering::SeqCst);
//! });
//! emitter.fire(&2);
//! drop(subscription);
//! emitter.fire(&5);
//! assert_eq!(seen.load(Ordering::SeqCst), 2);
//! ```

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    disposed: AtomicBool,
}

impl<T> Registry<T> {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener<T>)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Emitter
// ============================================================================

/// Typed observer list for one kind of event
pub struct Emitter<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.registry.listeners().len())
            .field("disposed", &self.registry.disposed.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T: 'static> Emitter<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Register a listener. It stays registered until the returned
    /// [`Subscription`] is disposed or dropped.
    ///
    /// Registering on a disposed emitter returns an inert subscription.
    pub fn on<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        if self.is_disposed() {
            return Subscription::empty();
        }
        let id = self.registry.next_id.fetch_add(1, Ordering::SeqCst);
        self.registry.listeners().push((id, Arc::new(listener)));

        let registry = Arc::downgrade(&self.registry);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.listeners().retain(|(existing, _)| *existing != id);
            }
        })
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// Listeners may subscribe or unsubscribe while the event is delivered;
    /// changes take effect from the next `fire`.
    pub fn fire(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = self
            .registry
            .listeners()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.listeners().len()
    }

    /// Drop every listener; later registrations are ignored.
    pub fn dispose(&self) {
        self.registry.disposed.store(true, Ordering::SeqCst);
        self.registry.listeners().clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.registry.disposed.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle returned by [`Emitter::on`].
///
/// Dropping the handle unregisters the listener. Use [`Subscription::detach`]
/// to keep a listener for the emitter's whole lifetime.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    dispose: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    /// Wrap a cleanup closure
    pub fn new(dispose: impl FnOnce() + Send + 'static) -> Self {
        Self {
            dispose: Mutex::new(Some(Box::new(dispose))),
        }
    }

    /// A subscription with nothing to clean up
    pub fn empty() -> Self {
        Self {
            dispose: Mutex::new(None),
        }
    }

    pub fn dispose(mut self) {
        if let Some(dispose) = self.take_dispose() {
            dispose();
        }
    }

    /// Forget the handle without unregistering the listener
    pub fn detach(mut self) {
        *self.dispose.get_mut().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn take_dispose(&mut self) -> Option<Box<dyn FnOnce() + Send>> {
        self.dispose.get_mut().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(dispose) = self.take_dispose() {
            dispose();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field(
                "active",
                &self
                    .dispose
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .is_some(),
            )
            .finish()
    }
}

// ============================================================================
// Disposables
// ============================================================================

/// A collection of cleanups disposed together, most recent first.
///
/// Once disposed, anything pushed is disposed immediately.
#[derive(Debug, Default)]
pub struct Disposables {
    items: Vec<Subscription>,
    disposed: bool,
}

impl Disposables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, subscription: Subscription) {
        if self.disposed {
            subscription.dispose();
        } else {
            self.items.push(subscription);
        }
    }

    pub fn push_fn(&mut self, cleanup: impl FnOnce() + Send + 'static) {
        self.push(Subscription::new(cleanup));
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
        while let Some(item) = self.items.pop() {
            item.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Drop for Disposables {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ============================================================================
// Wait-until events
// ============================================================================

/// Event payload whose listeners can postpone the firing party.
///
/// Listeners call [`WaitUntilEvent::wait_until`] with a future; the party that
/// fired the event awaits all of them via [`fire_wait_until`].
pub struct WaitUntilEvent<T> {
    pub data: T,
    pending: Mutex<Vec<BoxFuture<'static, ()>>>,
}

impl<T> WaitUntilEvent<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn wait_until<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Box::pin(work));
    }

    async fn settle(self) {
        let pending = self
            .pending
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        futures::future::join_all(pending).await;
    }
}

impl<T: fmt::Debug> fmt::Debug for WaitUntilEvent<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitUntilEvent")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// Fire `data` on `emitter` and wait for every participant registered through
/// [`WaitUntilEvent::wait_until`].
pub async fn fire_wait_until<T: Send + 'static>(emitter: &Emitter<WaitUntilEvent<T>>, data: T) {
    let event = WaitUntilEvent::new(data);
    emitter.fire(&event);
    event.settle().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fire_in_registration_order() {
        let emitter = Emitter::<&'static str>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = log.clone();
        let _a = emitter.on(move |e| first.lock().unwrap().push(format!("a:{e}")));
        let second = log.clone();
        let _b = emitter.on(move |e| second.lock().unwrap().push(format!("b:{e}")));

        emitter.fire(&"x");
        assert_eq!(*log.lock().unwrap(), vec!["a:x", "b:x"]);
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let emitter = Emitter::<()>::new();
        let sub = emitter.on(|_| {});
        assert_eq!(emitter.listener_count(), 1);
        drop(sub);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_detached_subscription_stays_registered() {
        let emitter = Emitter::<()>::new();
        emitter.on(|_| {}).detach();
        assert_eq!(emitter.listener_count(), 1);
    }

    #[test]
    fn test_listener_may_subscribe_during_fire() {
        let emitter = Emitter::<u8>::new();
        let inner = emitter.clone();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _sub = emitter.on(move |_| {
            let c = c.clone();
            inner
                .on(move |_| {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .detach();
        });

        emitter.fire(&1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        emitter.fire(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disposed_emitter_ignores_new_listeners() {
        let emitter = Emitter::<()>::new();
        let _sub = emitter.on(|_| {});
        emitter.dispose();
        assert_eq!(emitter.listener_count(), 0);
        let _late = emitter.on(|_| {});
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_disposables_run_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut disposables = Disposables::new();
        for i in 0..3 {
            let log = log.clone();
            disposables.push_fn(move || log.lock().unwrap().push(i));
        }
        disposables.dispose();
        assert_eq!(*log.lock().unwrap(), vec![2, 1, 0]);

        let late = log.clone();
        disposables.push_fn(move || late.lock().unwrap().push(9));
        assert_eq!(log.lock().unwrap().last(), Some(&9));
        assert!(disposables.is_empty());
    }

    #[tokio::test]
    async fn test_fire_wait_until_awaits_participants() {
        let emitter = Emitter::<WaitUntilEvent<String>>::new();
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let _sub = emitter.on(move |event| {
            assert_eq!(event.data, "python");
            let flag = flag.clone();
            event.wait_until(async move {
                tokio::task::yield_now().await;
                flag.store(true, Ordering::SeqCst);
            });
        });

        fire_wait_until(&emitter, "python".to_string()).await;
        assert!(done.load(Ordering::SeqCst));
    }
}
