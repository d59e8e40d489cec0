//! Health, readiness and liveness endpoint tests.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pushgate_api::{create_router, AppState};
use pushgate_dispatch::{Dispatcher, DispatcherConfig};
use pushgate_testing::RecordingSender;
use serde_json::Value;
use tower::ServiceExt;

fn setup() -> (Router, Arc<Dispatcher>) {
    let config = DispatcherConfig { worker_count: 3, queue_capacity: 25, send_timeout: None };
    let dispatcher = Arc::new(Dispatcher::new(config, Arc::new(RecordingSender::new())).unwrap());
    (create_router(AppState::new(dispatcher.clone())), dispatcher)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.expect("failed to make request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    (status, serde_json::from_slice(&bytes).expect("response should be valid JSON"))
}

#[tokio::test]
async fn health_reports_running_dispatcher() {
    let (router, dispatcher) = setup();
    dispatcher.run().unwrap();

    let (status, body) = get(&router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["dispatcher"]["state"], "running");
    assert_eq!(body["checks"]["dispatcher"]["capacity"], 25);
    assert_eq!(body["checks"]["dispatcher"]["active_workers"], 3);
    assert!(body["timestamp"].is_string());
    assert!(body["version"].is_string());

    dispatcher.stop().await.unwrap();
}

#[tokio::test]
async fn health_is_unavailable_before_start() {
    let (router, _dispatcher) = setup();

    let (status, body) = get(&router, "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["dispatcher"]["state"], "idle");
}

#[tokio::test]
async fn readiness_follows_dispatcher_lifecycle() {
    let (router, dispatcher) = setup();

    let (status, _) = get(&router, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    dispatcher.run().unwrap();
    let (status, body) = get(&router, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);

    dispatcher.stop().await.unwrap();
    let (status, body) = get(&router, "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["dispatcher"], "stopped");
}

#[tokio::test]
async fn liveness_ignores_dispatcher_state() {
    let (router, dispatcher) = setup();
    dispatcher.stop().await.unwrap();

    let (status, body) = get(&router, "/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}
