use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lastseen_api::config::ServerConfig;
use lastseen_api::router::build_app_router;
use lastseen_api::state::AppState;
use lastseen_core::config::MonitorConfig;
use lastseen_events::alert_log::DEFAULT_ALERT_LOG_CAPACITY;
use lastseen_events::{AlertLog, EventBus};
use lastseen_monitor::{EvaluationScheduler, Monitor};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lastseen_api=debug,lastseen_monitor=info,lastseen_events=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(?config, "Loaded server configuration");

    let monitor_config = MonitorConfig::from_env().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Invalid monitor configuration, using defaults");
        MonitorConfig::default()
    });

    // --- Event bus and alert log ---
    let event_bus = Arc::new(EventBus::default());
    let alert_log = AlertLog::new(DEFAULT_ALERT_LOG_CAPACITY);
    let alert_log_handle = tokio::spawn(alert_log.clone().run(event_bus.subscribe()));
    tracing::info!("Alert log started");

    // --- Monitor ---
    let monitor = Arc::new(
        Monitor::new(monitor_config, Arc::clone(&event_bus))
            .expect("Default monitor configuration must be valid"),
    );
    tracing::info!(mode = monitor.mode().as_str(), "Monitor created");

    // --- Periodic evaluation ---
    let scheduler_cancel = CancellationToken::new();
    let scheduler = EvaluationScheduler::new(Arc::clone(&monitor));
    let scheduler_cancel_clone = scheduler_cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_cancel_clone).await;
    });
    tracing::info!("Evaluation scheduler started");

    let state = AppState {
        config: Arc::new(config.clone()),
        monitor,
        event_bus,
        alert_log,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    // Stop the scheduler; an in-flight sweep finishes first.
    scheduler_cancel.cancel();
    let _ = tokio::time::timeout(shutdown_timeout, scheduler_handle).await;
    tracing::info!("Evaluation scheduler stopped");

    // The scheduler and router held the last bus senders; with them gone
    // the channel closes and the alert log drains and exits.
    let _ = tokio::time::timeout(shutdown_timeout, alert_log_handle).await;
    tracing::info!("Alert log stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
