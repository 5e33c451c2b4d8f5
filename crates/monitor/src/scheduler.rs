//! Periodic evaluation.
//!
//! [`EvaluationScheduler`] runs as a background task: one sweep at start-up,
//! then one every `check_every_minutes`. The interval is re-read after every
//! sweep so configuration changes apply to the next wait.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::engine::Monitor;

/// Background service that re-evaluates every tracked entity.
pub struct EvaluationScheduler {
    monitor: Arc<Monitor>,
}

impl EvaluationScheduler {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self { monitor }
    }

    /// Run the evaluation loop until `cancel` is triggered.
    ///
    /// Cancellation interrupts the wait between sweeps; a sweep in progress
    /// completes first.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval_secs = self.monitor.config().await.check_interval().as_secs();
        tracing::info!(interval_secs, "Evaluation scheduler started");

        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.monitor.evaluate().await;

            let interval = self.monitor.config().await.check_interval();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!("Evaluation scheduler stopping");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lastseen_core::config::MonitorConfig;
    use lastseen_events::bus::EVALUATION_COMPLETED;
    use lastseen_events::EventBus;

    use super::*;

    #[tokio::test]
    async fn sweeps_immediately_and_stops_on_cancel() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let monitor = Arc::new(Monitor::new(MonitorConfig::default(), bus).unwrap());
        let cancel = CancellationToken::new();

        let scheduler = EvaluationScheduler::new(monitor);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { scheduler.run(token).await });

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("first sweep should run promptly")
            .expect("bus open");
        assert_eq!(event.event_type, EVALUATION_COMPLETED);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler should stop after cancel")
            .expect("scheduler task should not panic");
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn run_future_can_be_spawned() {
        let bus = Arc::new(EventBus::default());
        let monitor = Arc::new(Monitor::new(MonitorConfig::default(), bus).unwrap());
        let scheduler = EvaluationScheduler::new(monitor);

        let run = scheduler.run(CancellationToken::new());
        assert_send(&run);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_sweeps() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let monitor = Arc::new(Monitor::new(MonitorConfig::default(), bus).unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();

        EvaluationScheduler::new(monitor).run(cancel).await;

        assert!(rx.try_recv().is_err());
    }
}
