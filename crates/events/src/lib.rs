//! Monitor event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`MonitorEvent`]: the event envelope.
//! - [`AlertLog`]: subscriber that logs and retains raised alerts.

pub mod alert_log;
pub mod bus;

pub use alert_log::AlertLog;
pub use bus::{EventBus, MonitorEvent};
