//! Alert outlet.
//!
//! [`AlertLog`] subscribes to the [`EventBus`](crate::bus::EventBus), writes
//! every `alert.raised` event to the log and keeps the most recent ones in
//! memory for inspection. External delivery channels subscribe to the bus
//! the same way.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use crate::bus::{MonitorEvent, ALERT_RAISED};

/// Number of alerts kept when no capacity is given.
pub const DEFAULT_ALERT_LOG_CAPACITY: usize = 100;

/// Bounded, newest-last record of raised alerts.
#[derive(Clone)]
pub struct AlertLog {
    entries: Arc<RwLock<VecDeque<MonitorEvent>>>,
    capacity: usize,
}

impl AlertLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Run the logging loop until the bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<MonitorEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) if event.is(ALERT_RAISED) => self.record(event).await,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Alert log lagged, some alerts were not recorded");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, alert log shutting down");
                    break;
                }
            }
        }
    }

    /// Log and store one alert event.
    pub async fn record(&self, event: MonitorEvent) {
        let entity_id = event.entity_id.as_deref().unwrap_or("-");
        let message = event.payload["message"].as_str().unwrap_or_default();
        if event.payload["silent"].as_bool().unwrap_or(false) {
            tracing::info!(
                entity_id,
                alert_level = %event.payload["level"],
                alert_message = message,
                "Silent alert"
            );
        } else {
            tracing::warn!(
                entity_id,
                alert_level = %event.payload["level"],
                alert_message = message,
                "Entity alert"
            );
        }

        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(event);
    }

    /// Up to `limit` most recent alerts, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<MonitorEvent> {
        self.entries
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_LOG_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
