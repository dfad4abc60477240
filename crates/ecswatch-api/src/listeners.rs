//! Listener registry for inbound events.
//!
//! At most one handler is attached per [`EventKind`]. Registering a handler
//! set first detaches whatever was attached for each of those events, so
//! re-registering (a consumer re-mounting, a reconnect) never makes an
//! event fire twice.

use std::sync::Arc;

use dashmap::DashMap;
use strum::IntoEnumIterator;
use tokio::sync::mpsc;

use crate::protocol::{EventKind, InboundEvent};

/// Callback invoked for one inbound event.
pub type Handler = Arc<dyn Fn(Arc<InboundEvent>) + Send + Sync>;

/// A set of handlers to register in one call.
#[derive(Default, Clone)]
pub struct Listeners {
    handlers: Vec<(EventKind, Handler)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `handler` to `kind`. A later `on` for the same kind wins.
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(Arc<InboundEvent>) + Send + Sync + 'static,
    {
        self.handlers.retain(|(k, _)| *k != kind);
        self.handlers.push((kind, Arc::new(handler)));
        self
    }

    /// Forward every event kind into `tx`, in delivery order.
    pub fn forward_all(tx: &mpsc::UnboundedSender<Arc<InboundEvent>>) -> Self {
        Self::forward_all_with(tx, |event| event)
    }

    /// Like [`forward_all`](Self::forward_all), wrapping each event first.
    pub fn forward_all_with<T>(
        tx: &mpsc::UnboundedSender<T>,
        wrap: fn(Arc<InboundEvent>) -> T,
    ) -> Self
    where
        T: Send + 'static,
    {
        EventKind::iter().fold(Self::new(), |listeners, kind| {
            let tx = tx.clone();
            listeners.on(kind, move |event| {
                // Receiver gone means the consumer detached; nothing to do.
                let _ = tx.send(wrap(event));
            })
        })
    }

    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.handlers.iter().map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

/// Handlers currently attached to the channel.
#[derive(Default)]
pub struct ListenerRegistry {
    handlers: DashMap<EventKind, Handler>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach every handler in `listeners`, detaching any previous handler
    /// for the same event first.
    pub fn register(&self, listeners: Listeners) {
        for (kind, handler) in listeners.handlers {
            if self.handlers.remove(&kind).is_some() {
                tracing::debug!(event = %kind, "detached previous listener");
            }
            self.handlers.insert(kind, handler);
        }
    }

    /// Detach every handler.
    pub fn unregister_all(&self) {
        self.handlers.clear();
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke the handler attached to this event's kind, if any.
    ///
    /// The handler is cloned out of the map before it runs so it may
    /// itself register or unregister listeners.
    pub fn dispatch(&self, event: Arc<InboundEvent>) -> bool {
        let kind = event.kind();
        let handler = self.handlers.get(&kind).map(|h| Arc::clone(h.value()));
        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => {
                tracing::trace!(event = %kind, "no listener attached");
                false
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
