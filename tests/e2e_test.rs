//! End-to-end tests for complete notification workflows.
//!
//! Exercises the full system from HTTP submission through the dispatcher
//! and the FCM client to a mock provider, including graceful shutdown.

use std::{net::TcpListener, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Request, StatusCode},
};
use pushgate_api::{create_router, start_server, AppState, Config};
use pushgate_dispatch::{Dispatcher, DispatcherConfig};
use pushgate_fcm::{FcmClient, FcmConfig, ServiceAccountKey};
use pushgate_testing::{
    fixtures::TEST_PROJECT_ID, service_account_json, within_deadline, FcmMock, RecordingSender,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const ACCESS_TOKEN: &str = "ya29.e2e";

async fn fcm_sender(mock: &FcmMock) -> Result<FcmClient> {
    mock.mock_token(ACCESS_TOKEN, 3600).await;
    mock.mock_send_success(TEST_PROJECT_ID, ACCESS_TOKEN, "projects/pushgate-test/messages/e2e")
        .await;

    let key = ServiceAccountKey::from_json(&service_account_json(&mock.token_uri()).to_string())?;
    let config = FcmConfig { endpoint: mock.uri(), ..Default::default() };
    Ok(FcmClient::from_service_account(config, key)?)
}

/// The golden path: HTTP request, admission, delivery to FCM, drain.
#[tokio::test]
async fn notifications_flow_from_http_to_fcm() -> Result<()> {
    let mock = FcmMock::start().await;
    let sender = fcm_sender(&mock).await?;

    let config = Config { worker_pool_size: 4, queue_capacity: 16, ..Default::default() };
    let dispatcher = Arc::new(Dispatcher::new(config.to_dispatcher_config(), Arc::new(sender))?);
    dispatcher.run()?;
    let router = create_router(AppState::new(dispatcher.clone()));

    let payloads = [
        json!({"title": "Welcome", "body": "Thanks for signing up", "target": "device-token-001"}),
        json!({"title": "Digest", "body": "Your weekly summary", "target": "weekly", "is_topic": true}),
        json!({"title": "Order", "body": "Shipped", "target": "device-token-002", "data": {"order": "77"}}),
    ];
    for payload in &payloads {
        let request = Request::builder()
            .method("POST")
            .uri("/send-fcm")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))?;
        let response = router.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    within_deadline("drain", dispatcher.stop()).await?;

    let stats = dispatcher.stats();
    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.failed, 0);

    let mut bodies = mock.send_bodies().await;
    bodies.sort_by_key(|body| body["message"]["notification"]["title"].to_string());
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[0]["message"]["topic"], "weekly");
    assert_eq!(bodies[1]["message"]["data"]["order"], "77");
    assert_eq!(bodies[2]["message"]["token"], "device-token-001");

    // One token exchange serves every worker.
    assert_eq!(mock.token_requests().await.len(), 1);
    Ok(())
}

/// Provider failures are absorbed by the workers, never retried.
#[tokio::test]
async fn provider_outage_is_logged_not_retried() -> Result<()> {
    let mock = FcmMock::start().await;
    mock.mock_token(ACCESS_TOKEN, 3600).await;
    mock.mock_send_failure(TEST_PROJECT_ID, 503, "UNAVAILABLE", "backend unavailable").await;

    let key = ServiceAccountKey::from_json(&service_account_json(&mock.token_uri()).to_string())?;
    let sender = FcmClient::from_service_account(FcmConfig { endpoint: mock.uri(), ..Default::default() }, key)?;

    let config = DispatcherConfig { worker_count: 2, queue_capacity: 8, send_timeout: None };
    let dispatcher = Dispatcher::new(config, Arc::new(sender))?;
    dispatcher.run()?;

    for n in 0..4 {
        dispatcher.submit(pushgate_testing::JobBuilder::new().title(format!("n{n}")).build())?;
    }
    within_deadline("drain", dispatcher.stop()).await?;

    assert_eq!(dispatcher.stats().failed, 4);
    assert_eq!(mock.send_bodies().await.len(), 4);
    Ok(())
}

/// Shutdown order: listener closes on cancellation, then the queue drains.
#[tokio::test]
async fn server_stops_on_cancellation_before_drain() -> Result<()> {
    let sender = Arc::new(RecordingSender::new());
    let config = DispatcherConfig { worker_count: 2, queue_capacity: 8, send_timeout: None };
    let dispatcher = Arc::new(Dispatcher::new(config, sender.clone())?);
    dispatcher.run()?;

    let addr = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(start_server(
        AppState::new(dispatcher.clone()).with_request_timeout(Duration::from_secs(5)),
        addr,
        shutdown.clone(),
    ));

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/send-fcm");
    let mut accepted = false;
    for _ in 0..50 {
        match client
            .post(&url)
            .json(&json!({"title": "t", "body": "b", "target": "device-token"}))
            .send()
            .await
        {
            Ok(response) => {
                assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
                accepted = true;
                break;
            },
            // Listener not bound yet.
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    assert!(accepted, "server never accepted a request");

    shutdown.cancel();
    within_deadline("listener shutdown", server).await??;

    within_deadline("drain", dispatcher.stop()).await?;
    assert_eq!(sender.calls(), 1);
    Ok(())
}
