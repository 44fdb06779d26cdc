//! Event Bus - central pub/sub for engine push events
//!
//! The EventBus uses a tokio broadcast channel so every subscriber gets its
//! own ordered copy of every event emitted after it subscribed.

use lancea_model::{Epoch, ErrorPayload, Preview};
use tokio::sync::broadcast;
use tracing::debug;

use super::types::EngineEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Central event bus for engine push events
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
    channel_capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            channel_capacity: capacity.max(1),
        }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped. A
    /// subscriber that falls more than `capacity` events behind is told how
    /// many it missed on its next receive.
    pub fn emit(&self, event: EngineEvent) {
        debug!(
            event_type = event.event_type(),
            epoch = %event.epoch(),
            provider_id = event.provider_id(),
            "EventBus::emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to one epoch and provider
    pub fn emitter_for(&self, epoch: Epoch, provider_id: impl Into<String>) -> EventEmitter {
        let provider_id = provider_id.into();
        debug!(%epoch, %provider_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            epoch,
            provider_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.channel_capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Handle for emitting events scoped to one (epoch, provider) pair
///
/// Cheap to clone; used by the dispatcher so preview and error events carry
/// the epoch the request was made against.
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<EngineEvent>,
    epoch: Epoch,
    provider_id: String,
}

impl EventEmitter {
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: EngineEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    /// Emit a preview for one key
    pub fn preview(&self, key: &str, preview: Preview) {
        self.emit(EngineEvent::preview(self.epoch, self.provider_id.clone(), key, preview));
    }

    /// Emit a provider-scoped error
    pub fn provider_error(&self, error: ErrorPayload) {
        self.emit(EngineEvent::provider_error(self.epoch, self.provider_id.clone(), error));
    }
}
