//! Event Dispatcher
//!
//! Synchronous, ordered fan-out of events to registered listeners. Listeners
//! run on the thread that performed the mutation, in registration order. A
//! failing or panicking listener is logged and skipped; it never fails the
//! mutation and never stops delivery to the listeners registered after it.

use crate::error::Result;
use parking_lot::RwLock;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{trace, warn};

// =============================================================================
// Listener
// =============================================================================

/// Observer of registry events
pub trait Listener<E>: Send + Sync {
    /// Name used when logging failures
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Handle one event
    fn on_event(&self, event: &E) -> Result<()>;
}

impl<E, F> Listener<E> for F
where
    F: Fn(&E) -> Result<()> + Send + Sync,
{
    fn on_event(&self, event: &E) -> Result<()> {
        self(event)
    }
}

// =============================================================================
// Event Dispatcher
// =============================================================================

/// Append-only listener list with failure isolation
pub struct EventDispatcher<E> {
    /// Registered listeners, in registration order
    listeners: RwLock<Vec<Arc<dyn Listener<E>>>>,
    /// Catch listener panics instead of unwinding into the caller
    catch_panics: bool,
    /// Listener invocations that failed or panicked
    failures: AtomicU64,
}

impl<E: std::fmt::Debug> EventDispatcher<E> {
    /// Create a dispatcher that isolates listener panics
    pub fn new() -> Self {
        Self::with_panic_isolation(true)
    }

    /// Create a dispatcher, choosing whether listener panics are caught
    pub fn with_panic_isolation(catch_panics: bool) -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            catch_panics,
            failures: AtomicU64::new(0),
        }
    }

    /// Register a listener. The same listener may be registered twice and
    /// then receives every event twice.
    pub fn register(&self, listener: Arc<dyn Listener<E>>) {
        self.listeners.write().push(listener);
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Total failed listener invocations since creation
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Deliver an event to every listener. Returns the number of listeners
    /// that failed.
    pub fn dispatch(&self, event: &E) -> usize {
        // Snapshot so listeners can register more listeners while running
        let listeners: Vec<Arc<dyn Listener<E>>> = self.listeners.read().clone();
        let mut failed = 0;

        for listener in &listeners {
            let outcome = if self.catch_panics {
                panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)))
            } else {
                Ok(listener.on_event(event))
            };

            match outcome {
                Ok(Ok(())) => {
                    trace!(listener = listener.name(), "Delivered {:?}", event);
                }
                Ok(Err(e)) => {
                    failed += 1;
                    warn!(listener = listener.name(), "Listener failed on {:?}: {}", event, e);
                }
                Err(payload) => {
                    failed += 1;
                    warn!(
                        listener = listener.name(),
                        "Listener panicked on {:?}: {}",
                        event,
                        panic_message(payload.as_ref())
                    );
                }
            }
        }

        if failed > 0 {
            self.failures.fetch_add(failed as u64, Ordering::Relaxed);
        }
        failed
    }
}

impl<E: std::fmt::Debug> Default for EventDispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.read().len())
            .field("catch_panics", &self.catch_panics)
            .field("failures", &self.failures.load(Ordering::Relaxed))
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

// =============================================================================
// Broadcast Listener
// =============================================================================

/// Forwards events into a tokio broadcast channel for async consumers.
///
/// Receivers that fall behind lose the oldest events, as with any broadcast
/// channel; the synchronous listeners are unaffected.
pub struct BroadcastListener<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> BroadcastListener<E> {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Get an event receiver
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

impl<E: Clone + Send + Sync + 'static> Listener<E> for BroadcastListener<E> {
    fn name(&self) -> &str {
        "broadcast"
    }

    fn on_event(&self, event: &E) -> Result<()> {
        // No receivers is not a failure
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;

    fn recorder(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<dyn Listener<u32>> {
        Arc::new(move |event: &u32| -> Result<()> {
            log.lock().push(format!("{tag}:{event}"));
            Ok(())
        })
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::<u32>::new();
        dispatcher.register(recorder("a", log.clone()));
        dispatcher.register(recorder("b", log.clone()));

        assert_eq!(dispatcher.dispatch(&1), 0);
        assert_eq!(dispatcher.dispatch(&2), 0);

        assert_eq!(*log.lock(), vec!["a:1", "b:1", "a:2", "b:2"]);
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::<u32>::new();
        dispatcher.register(recorder("first", log.clone()));
        dispatcher.register(Arc::new(|event: &u32| -> Result<()> {
            if *event == 1 {
                Err(Error::listener("flaky", "rejected"))
            } else {
                Ok(())
            }
        }));
        dispatcher.register(Arc::new(|event: &u32| -> Result<()> {
            if *event == 1 {
                panic!("listener blew up");
            }
            Ok(())
        }));
        dispatcher.register(recorder("last", log.clone()));

        assert_eq!(dispatcher.dispatch(&1), 2);
        assert_eq!(dispatcher.dispatch(&2), 0);

        assert_eq!(*log.lock(), vec!["first:1", "last:1", "first:2", "last:2"]);
        assert_eq!(dispatcher.failure_count(), 2);
    }

    #[test]
    fn test_duplicate_registration_delivers_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = EventDispatcher::<u32>::new();
        let listener = recorder("dup", log.clone());
        dispatcher.register(listener.clone());
        dispatcher.register(listener);

        dispatcher.dispatch(&7);
        assert_eq!(dispatcher.len(), 2);
        assert_eq!(*log.lock(), vec!["dup:7", "dup:7"]);
    }

    #[test]
    fn test_listener_may_register_during_dispatch() {
        let dispatcher = Arc::new(EventDispatcher::<u32>::new());
        let inner = dispatcher.clone();
        dispatcher.register(Arc::new(move |_: &u32| -> Result<()> {
            inner.register(Arc::new(|_: &u32| -> Result<()> { Ok(()) }));
            Ok(())
        }));

        dispatcher.dispatch(&1);
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn test_broadcast_listener_forwards() {
        let broadcast = Arc::new(BroadcastListener::<u32>::new(16));
        let mut rx = broadcast.subscribe();

        let dispatcher = EventDispatcher::<u32>::new();
        dispatcher.register(broadcast.clone());
        dispatcher.dispatch(&42);

        let received = tokio_test::block_on(rx.recv()).unwrap();
        assert_eq!(received, 42);
    }
}
