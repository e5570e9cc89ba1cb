//! Input Events & Event Source
//!
//! The collector subscribes to an `InputEventSource` for the lifetime of a
//! session. `Subscription` unsubscribes on drop so observers never leak
//! across sessions, even when the owner unwinds.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

// ============================================================================
// EVENTS
// ============================================================================

/// Raw input observed on the sign-in surface. Times are clock milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerMove { x: f64, y: f64, at_ms: u64 },
    KeyDown { at_ms: u64 },
    Paste { at_ms: u64 },
    Click { at_ms: u64 },
}

impl InputEvent {
    pub fn at_ms(&self) -> u64 {
        match *self {
            InputEvent::PointerMove { at_ms, .. }
            | InputEvent::KeyDown { at_ms }
            | InputEvent::Paste { at_ms }
            | InputEvent::Click { at_ms } => at_ms,
        }
    }
}

pub type EventHandler = Arc<dyn Fn(&InputEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

// ============================================================================
// SOURCE
// ============================================================================

/// Capability to observe pointer, key, paste and click events
pub trait InputEventSource: Send + Sync {
    fn subscribe(&self, handler: EventHandler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Scoped subscription; dropping it removes the handler
pub struct Subscription {
    source: Arc<dyn InputEventSource>,
    id: SubscriptionId,
}

impl Subscription {
    pub fn new(source: Arc<dyn InputEventSource>, handler: EventHandler) -> Self {
        let id = source.subscribe(handler);
        Self { source, id }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.source.unsubscribe(self.id);
        log::debug!("Input subscription {:?} released", self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ============================================================================
// IN-PROCESS BUS
// ============================================================================

/// Fan-out event source used by hosts that push events in-process
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<BTreeMap<SubscriptionId, EventHandler>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every current subscriber
    pub fn emit(&self, event: InputEvent) {
        // Clone handlers out so a handler may (un)subscribe without deadlocking
        let handlers: Vec<EventHandler> = self.handlers.read().values().cloned().collect();
        for handler in handlers {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl InputEventSource for EventBus {
    fn subscribe(&self, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.write().insert(id, handler);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.handlers.write().remove(&id);
    }
}
