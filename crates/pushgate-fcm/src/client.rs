//! FCM HTTP v1 client implementing [`PushSender`].
//!
//! One call to [`PushSender::send`] is one `messages:send` request. HTTP
//! responses are categorized into [`SendError`] variants so the worker's log
//! record says why a delivery failed; nothing here retries.

use std::{collections::HashMap, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use pushgate_core::{DeliveryId, NotificationJob};
use pushgate_dispatch::{PushSender, SendError};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use tracing::{debug, info_span, Instrument};

use crate::{
    auth::{AccessTokenProvider, ServiceAccountTokenProvider},
    credentials::ServiceAccountKey,
    error::{FcmError, Result},
    DEFAULT_FCM_ENDPOINT,
};

/// Configuration for the FCM client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FcmConfig {
    /// Base URL of the FCM API.
    pub endpoint: String,
    /// Timeout for a single HTTP request, token exchanges included.
    pub request_timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_FCM_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(15),
            user_agent: concat!("pushgate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    topic: Option<&'a str>,
    notification: Notification<'a>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    data: &'a HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Notification<'a> {
    title: &'a str,
    body: &'a str,
}

impl<'a> From<&'a NotificationJob> for SendRequest<'a> {
    fn from(job: &'a NotificationJob) -> Self {
        let target = job.target();
        let (token, topic) = if target.is_topic() {
            (None, Some(target.value()))
        } else {
            (Some(target.value()), None)
        };

        Self {
            message: Message {
                token,
                topic,
                notification: Notification { title: job.title(), body: job.body() },
                data: job.data(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Push sender backed by the FCM HTTP v1 API.
#[derive(Clone)]
pub struct FcmClient {
    http: reqwest::Client,
    config: FcmConfig,
    project_id: String,
    send_url: String,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl FcmClient {
    /// Creates a client for `project_id` authorized by `tokens`.
    ///
    /// # Errors
    ///
    /// Returns `HttpClient` if the HTTP client cannot be configured.
    pub fn new(
        config: FcmConfig,
        project_id: impl Into<String>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self> {
        let http = build_http_client(&config)?;
        Ok(Self::with_http_client(http, config, project_id.into(), tokens))
    }

    /// Creates a client authorized by a service account key.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrivateKey` for an unusable key and `HttpClient` if
    /// the HTTP client cannot be configured.
    pub fn from_service_account(config: FcmConfig, key: ServiceAccountKey) -> Result<Self> {
        let http = build_http_client(&config)?;
        let project_id = key.project_id.clone();
        let tokens = Arc::new(ServiceAccountTokenProvider::new(key, http.clone())?);
        Ok(Self::with_http_client(http, config, project_id, tokens))
    }

    /// Creates a client from a service account key file.
    ///
    /// # Errors
    ///
    /// Returns any error from reading the key or building the client.
    pub fn from_credentials_file(config: FcmConfig, path: impl AsRef<Path>) -> Result<Self> {
        let key = ServiceAccountKey::from_file(path)?;
        Self::from_service_account(config, key)
    }

    fn with_http_client(
        http: reqwest::Client,
        config: FcmConfig,
        project_id: String,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        let send_url = format!(
            "{}/v1/projects/{project_id}/messages:send",
            config.endpoint.trim_end_matches('/')
        );
        Self { http, config, project_id, send_url, tokens }
    }

    /// Firebase project messages are sent for.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Client configuration.
    pub fn config(&self) -> &FcmConfig {
        &self.config
    }

    async fn post(&self, job: &NotificationJob) -> std::result::Result<DeliveryId, SendError> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(&self.send_url)
            .bearer_auth(token)
            .json(&SendRequest::from(job))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::timeout(self.config.request_timeout)
                } else {
                    SendError::network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let retry_after = retry_after_seconds(response.headers());
        let body = response.text().await.unwrap_or_default();
        debug!(status, "fcm responded");

        if (200..300).contains(&status) {
            return serde_json::from_str::<SendResponse>(&body)
                .map(|response| DeliveryId::new(response.name))
                .map_err(|e| SendError::internal(format!("unexpected FCM response: {e}")));
        }

        Err(classify_failure(status, retry_after, &body))
    }
}

#[async_trait]
impl PushSender for FcmClient {
    async fn send(&self, job: &NotificationJob) -> std::result::Result<DeliveryId, SendError> {
        let span = info_span!(
            "fcm_send",
            job_id = %job.id(),
            target = %job.target(),
            project = %self.project_id,
        );
        self.post(job).instrument(span).await
    }
}

impl std::fmt::Debug for FcmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FcmClient")
            .field("project_id", &self.project_id)
            .field("send_url", &self.send_url)
            .finish_non_exhaustive()
    }
}

fn build_http_client(config: &FcmConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(&config.user_agent)
        .build()
        .map_err(|e| FcmError::HttpClient { message: e.to_string() })
}

/// Maps a non-2xx FCM response to a send error.
fn classify_failure(status: u16, retry_after: Option<u64>, body: &str) -> SendError {
    let message = describe_error(status, body);
    match status {
        401 | 403 => SendError::authentication(message),
        429 => SendError::rate_limited(retry_after, message),
        400..=499 => SendError::rejected(status, message),
        _ => SendError::unavailable(status, message),
    }
}

/// Renders FCM's error envelope as `STATUS: message`, falling back to the
/// raw body.
fn describe_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error: ErrorBody { status: Some(code), message: Some(message) } }) => {
            format!("{code}: {message}")
        },
        Ok(ErrorEnvelope { error: ErrorBody { status: Some(code), message: None } }) => code,
        Ok(ErrorEnvelope { error: ErrorBody { status: None, message: Some(message) } }) => message,
        _ if body.trim().is_empty() => format!("HTTP {status}"),
        _ => body.chars().take(512).collect(),
    }
}

/// Reads `Retry-After` as delta seconds or an HTTP date.
fn retry_after_seconds(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let remaining = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(remaining.to_std().map_or(0, |duration| duration.as_secs()))
}
