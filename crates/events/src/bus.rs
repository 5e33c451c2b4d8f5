//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`MonitorEvent`]s. It is
//! shared via `Arc<EventBus>` between the monitor and its consumers.

use chrono::{DateTime, Utc};
use lastseen_core::types::EntityId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A sweep finished and a new snapshot was published.
pub const EVALUATION_COMPLETED: &str = "evaluation.completed";
/// An entity's health differs from the previous sweep.
pub const HEALTH_CHANGED: &str = "health.changed";
/// The operating mode was replaced.
pub const MODE_CHANGED: &str = "mode.changed";
/// An entity stopped being tracked.
pub const ENTITY_REMOVED: &str = "entity.removed";
/// Learned cadence was discarded for one or all entities.
pub const LEARNING_RESET: &str = "learning.reset";
/// An unhealthy entity passed the alert throttle.
pub const ALERT_RAISED: &str = "alert.raised";

// ---------------------------------------------------------------------------
// MonitorEvent
// ---------------------------------------------------------------------------

/// Something that happened inside the monitor.
///
/// Constructed via [`MonitorEvent::new`] and enriched with
/// [`for_entity`](MonitorEvent::for_entity) and
/// [`with_payload`](MonitorEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorEvent {
    /// Dot-separated event name, e.g. `"health.changed"`.
    pub event_type: String,

    /// The entity the event is about, if any.
    pub entity_id: Option<EntityId>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl MonitorEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            entity_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn for_entity(mut self, entity_id: impl Into<EntityId>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`MonitorEvent`].
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// With no subscribers the event is dropped.
    pub fn publish(&self, event: MonitorEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(
            MonitorEvent::new(HEALTH_CHANGED)
                .for_entity("sensor.motion1")
                .with_payload(serde_json::json!({"from": "ok", "to": "stale"})),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert!(received.is(HEALTH_CHANGED));
        assert_eq!(received.entity_id.as_deref(), Some("sensor.motion1"));
        assert_eq!(received.payload["to"], "stale");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(MonitorEvent::new(MODE_CHANGED));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.event_type, MODE_CHANGED);
        assert_eq!(e2.event_type, MODE_CHANGED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(MonitorEvent::new(EVALUATION_COMPLETED));
    }

    #[test]
    fn bare_event_has_no_entity() {
        let event = MonitorEvent::new(LEARNING_RESET);
        assert!(event.entity_id.is_none());
        assert!(event.payload.is_object());
    }
}
