#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use lastseen_api::config::ServerConfig;
use lastseen_api::router::build_app_router;
use lastseen_api::state::AppState;
use lastseen_core::config::MonitorConfig;
use lastseen_events::{AlertLog, EventBus};
use lastseen_monitor::Monitor;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// Build the full application router around a fresh monitor.
///
/// The alert log is subscribed to the bus just like in `main.rs`, so alert
/// endpoints see what sweeps raise.
pub fn build_test_app() -> Router {
    build_test_app_with(MonitorConfig::default())
}

pub fn build_test_app_with(monitor_config: MonitorConfig) -> Router {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    let alert_log = AlertLog::default();
    tokio::spawn(alert_log.clone().run(event_bus.subscribe()));

    let monitor = Arc::new(
        Monitor::new(monitor_config, Arc::clone(&event_bus)).expect("valid test config"),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        monitor,
        event_bus,
        alert_log,
    };
    build_app_router(state, &config)
}

/// Send a GET request.
pub async fn get(app: Router, uri: &str) -> Response {
    send(app, Method::GET, uri, None).await
}

/// Send a DELETE request.
pub async fn delete(app: Router, uri: &str) -> Response {
    send(app, Method::DELETE, uri, None).await
}

/// Send a POST request with a JSON body.
pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::POST, uri, Some(body)).await
}

/// Send a PUT request with a JSON body.
pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(app, Method::PUT, uri, Some(body)).await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
