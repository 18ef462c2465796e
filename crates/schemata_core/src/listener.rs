//! Listener registry with replay.
//!
//! A new subscriber first receives every event published so far and is then
//! attached for future events. Both steps happen under one lock, so a
//! concurrent publisher can neither be missed nor delivered twice.

use std::fmt;
use std::sync::Mutex;

type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;

struct Inner<E> {
    history: Vec<E>,
    listeners: Vec<Listener<E>>,
}

/// Event log that replays history to late subscribers
pub struct ListenerRegistry<E> {
    inner: Mutex<Inner<E>>,
}

impl<E> ListenerRegistry<E> {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                history: Vec::new(),
                listeners: Vec::new(),
            }),
        }
    }

    /// Record an event and deliver it to every current listener
    ///
    /// Listeners run under the registry lock and must not publish to or
    /// subscribe on the same registry.
    pub fn publish(&self, event: E) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for listener in &inner.listeners {
            listener(&event);
        }
        inner.history.push(event);
    }

    /// Replay past events to `listener`, then keep it subscribed
    ///
    /// Returns the number of replayed events.
    pub fn subscribe<F>(&self, listener: F) -> usize
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        for event in &inner.history {
            listener(event);
        }
        inner.listeners.push(Box::new(listener));
        inner.history.len()
    }

    /// Number of events published so far
    #[must_use]
    pub fn published(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .history
            .len()
    }

    /// Number of subscribed listeners
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .listeners
            .len()
    }
}

impl<E> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("published", &self.published())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
