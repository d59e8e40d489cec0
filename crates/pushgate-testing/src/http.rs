//! HTTP mocks for the FCM HTTP v1 API and the OAuth2 token endpoint.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Path the OAuth2 token endpoint is mounted on.
pub const TOKEN_PATH: &str = "/token";

/// Mock server standing in for both Google endpoints.
pub struct FcmMock {
    server: MockServer,
}

impl FcmMock {
    /// Starts a new mock server on a random port.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// Base URL, usable as the FCM endpoint.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Token exchange URL, usable as a service account `token_uri`.
    pub fn token_uri(&self) -> String {
        format!("{}{TOKEN_PATH}", self.server.uri())
    }

    /// Path of the send endpoint for `project`.
    pub fn send_path(project: &str) -> String {
        format!("/v1/projects/{project}/messages:send")
    }

    /// Answers token exchanges with `access_token` valid for `expires_in`
    /// seconds.
    pub async fn mock_token(&self, access_token: &str, expires_in: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "expires_in": expires_in,
                "token_type": "Bearer",
            })))
            .mount(&self.server)
            .await;
    }

    /// Rejects token exchanges with `400 invalid_grant`.
    pub async fn mock_token_rejected(&self) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid JWT Signature.",
            })))
            .mount(&self.server)
            .await;
    }

    /// Accepts sends for `project` authorized with `access_token`, replying
    /// with message name `name`.
    pub async fn mock_send_success(&self, project: &str, access_token: &str, name: &str) {
        Mock::given(method("POST"))
            .and(path(Self::send_path(project)))
            .and(header("authorization", format!("Bearer {access_token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": name })))
            .mount(&self.server)
            .await;
    }

    /// Fails sends for `project` with an FCM error envelope.
    pub async fn mock_send_failure(&self, project: &str, status: u16, fcm_status: &str, message: &str) {
        Mock::given(method("POST"))
            .and(path(Self::send_path(project)))
            .respond_with(ResponseTemplate::new(status).set_body_json(error_envelope(
                status,
                fcm_status,
                message,
            )))
            .mount(&self.server)
            .await;
    }

    /// Fails sends for `project` with `429` and a `Retry-After` header.
    pub async fn mock_send_rate_limited(&self, project: &str, retry_after_seconds: u64) {
        Mock::given(method("POST"))
            .and(path(Self::send_path(project)))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", retry_after_seconds.to_string())
                    .set_body_json(error_envelope(429, "RESOURCE_EXHAUSTED", "quota exceeded")),
            )
            .mount(&self.server)
            .await;
    }

    /// Answers sends for `project` only after `delay`.
    pub async fn mock_send_delayed(&self, project: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(Self::send_path(project)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "name": "projects/slow/messages/1" }))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// JSON bodies of every request received on the send endpoint.
    pub async fn send_bodies(&self) -> Vec<Value> {
        self.requests_matching(|p| p.ends_with("/messages:send"))
            .await
            .into_iter()
            .filter_map(|request| request.body_json::<Value>().ok())
            .collect()
    }

    /// Form bodies of every request received on the token endpoint.
    pub async fn token_requests(&self) -> Vec<String> {
        self.requests_matching(|p| p == TOKEN_PATH)
            .await
            .into_iter()
            .map(|request| String::from_utf8_lossy(&request.body).into_owned())
            .collect()
    }

    async fn requests_matching(&self, matches: impl Fn(&str) -> bool) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| matches(request.url.path()))
            .collect()
    }
}

fn error_envelope(code: u16, status: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "status": status,
        }
    })
}
