//! services/discussion_client/src/socket/listeners.rs
//!
//! Per-connection registry of caller-supplied event handlers.

use discussion_core::events::{EventKind, InboundEvent};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A type-erased handler. Typed wrappers ignore events of other kinds.
pub type Listener = Arc<dyn Fn(&InboundEvent) + Send + Sync>;

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Mutex<BTreeMap<EventKind, Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler. Handlers for one event fire in registration order.
    pub fn add(&self, kind: EventKind, listener: Listener) {
        self.listeners.lock().entry(kind).or_default().push(listener);
    }

    pub fn remove_all(&self) {
        self.listeners.lock().clear();
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().values().all(Vec::is_empty)
    }

    /// Invokes every handler registered for the event's kind and returns how
    /// many ran.
    ///
    /// The handler list is snapshotted first, so a handler may register or
    /// remove handlers without deadlocking; such changes apply from the next event.
    pub fn dispatch(&self, event: &InboundEvent) -> usize {
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }
}
