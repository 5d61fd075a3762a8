use std::sync::Arc;

use super::{GroupEvent, Listener};

/// Collects listeners before they are frozen into an [`EventDispatcher`].
pub struct EventRegistry {
    listeners: Vec<Box<dyn Listener>>,
}

impl EventRegistry {
    fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Register a listener to receive events.
    ///
    /// Listeners are called in the order they are registered.
    pub fn listen(&mut self, listener: impl Listener) -> &mut Self {
        self.listeners.push(Box::new(listener));
        self
    }
}

/// Delivers events to a fixed set of listeners.
///
/// Cheap to clone; every clone shares the same listeners. With no listeners
/// registered, dispatching is a no-op.
///
/// # Example
///
/// ```rust
/// use groupgate::events::EventDispatcher;
/// use groupgate::events::listeners::LoggingListener;
///
/// let events = EventDispatcher::with_listeners(|registry| {
///     registry.listen(LoggingListener::new());
/// });
/// assert_eq!(events.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<Vec<Box<dyn Listener>>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher from the listeners registered in `f`.
    pub fn with_listeners<F>(f: F) -> Self
    where
        F: FnOnce(&mut EventRegistry),
    {
        let mut registry = EventRegistry::new();
        f(&mut registry);
        Self {
            listeners: Arc::new(registry.listeners),
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Dispatch an event to all registered listeners.
    pub async fn dispatch(&self, event: GroupEvent) {
        for listener in self.listeners.iter() {
            listener.handle(&event).await;
        }
    }
}
