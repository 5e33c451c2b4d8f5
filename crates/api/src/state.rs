use std::sync::Arc;

use lastseen_events::{AlertLog, EventBus};
use lastseen_monitor::Monitor;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: inner data is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// The health monitor (registry, sweeps, queries).
    pub monitor: Arc<Monitor>,
    pub event_bus: Arc<EventBus>,
    /// Recently raised alerts.
    pub alert_log: AlertLog,
}
