//! Integration tests for the notification submission endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use pushgate_api::{create_router, AppState};
use pushgate_core::NotificationTarget;
use pushgate_dispatch::{Dispatcher, DispatcherConfig, PushSender};
use pushgate_testing::{wait_for, within_deadline, GatedSender, RecordingSender};
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup(sender: Arc<dyn PushSender>, worker_count: usize, queue_capacity: usize) -> (Router, Arc<Dispatcher>) {
    let config = DispatcherConfig { worker_count, queue_capacity, send_timeout: None };
    let dispatcher = Arc::new(Dispatcher::new(config, sender).unwrap());
    (create_router(AppState::new(dispatcher.clone())), dispatcher)
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/send-fcm")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: &Router, body: Value) -> (StatusCode, Value) {
    let response = router.clone().oneshot(post_json(&body.to_string())).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn valid_notification_is_queued_and_delivered() {
    let sender = Arc::new(RecordingSender::new());
    let (router, dispatcher) = setup(sender.clone(), 2, 10);
    dispatcher.run().unwrap();

    let (status, body) = send(
        &router,
        json!({
            "title": "Flash sale",
            "body": "50% off for the next hour",
            "target": "/topics/deals",
            "is_topic": true,
            "data": {"campaign": "autumn"}
        }),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "queued");
    assert!(body["job_id"].as_str().is_some_and(|id| !id.is_empty()));

    within_deadline("drain", dispatcher.stop()).await.unwrap();

    let jobs = sender.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id().to_string(), body["job_id"].as_str().unwrap());
    assert_eq!(jobs[0].target(), &NotificationTarget::Topic("deals".into()));
    assert_eq!(jobs[0].data()["campaign"], "autumn");
}

#[tokio::test]
async fn device_target_is_the_default() {
    let sender = Arc::new(RecordingSender::new());
    let (router, dispatcher) = setup(sender.clone(), 1, 10);
    dispatcher.run().unwrap();

    let (status, _) =
        send(&router, json!({"title": "Hi", "body": "There", "target": "device-token-abc"})).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    dispatcher.stop().await.unwrap();
    assert_eq!(sender.jobs()[0].target(), &NotificationTarget::Device("device-token-abc".into()));
}

#[tokio::test]
async fn missing_field_is_bad_request() {
    let (router, dispatcher) = setup(Arc::new(RecordingSender::new()), 1, 10);
    dispatcher.run().unwrap();

    let (status, body) = send(&router, json!({"title": "Hi", "target": "abc"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E1001");
    assert_eq!(dispatcher.stats().accepted, 0);
}

#[tokio::test]
async fn blank_field_is_bad_request() {
    let (router, dispatcher) = setup(Arc::new(RecordingSender::new()), 1, 10);
    dispatcher.run().unwrap();

    let (status, body) = send(&router, json!({"title": "   ", "body": "b", "target": "abc"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "E1001");
    assert!(body["error"]["message"].as_str().unwrap().contains("title"));
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (router, dispatcher) = setup(Arc::new(RecordingSender::new()), 1, 10);
    dispatcher.run().unwrap();

    let response = router.oneshot(post_json("{\"title\": ")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "E1001");
}

#[tokio::test]
async fn full_queue_is_service_unavailable() {
    let sender = Arc::new(GatedSender::new());
    let (router, dispatcher) = setup(sender.clone(), 1, 1);
    dispatcher.run().unwrap();

    let notification = json!({"title": "t", "body": "b", "target": "abc"});

    let (status, _) = send(&router, notification.clone()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for("worker holds the first job", || sender.started() == 1).await;

    let (status, _) = send(&router, notification.clone()).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = send(&router, notification).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "E1002");

    sender.open();
    within_deadline("drain", dispatcher.stop()).await.unwrap();
    assert_eq!(sender.completed(), 2);
}

#[tokio::test]
async fn stopped_dispatcher_is_service_unavailable() {
    let (router, dispatcher) = setup(Arc::new(RecordingSender::new()), 1, 10);
    dispatcher.run().unwrap();
    dispatcher.stop().await.unwrap();

    let (status, body) = send(&router, json!({"title": "t", "body": "b", "target": "abc"})).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "E1003");
    assert!(body["error"]["message"].as_str().unwrap().contains("stopped"));
}
