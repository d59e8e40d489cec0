//! Notification job builders and credential fixtures.

use std::collections::HashMap;

use pushgate_core::{NotificationJob, NotificationTarget};
use serde_json::{json, Value};

/// RSA private key (PKCS#8 PEM) used to sign test assertions. Test-only.
pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("../keys/test_rsa_private.pem");

/// Public half of [`TEST_PRIVATE_KEY_PEM`], for verifying signed assertions.
pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("../keys/test_rsa_public.pem");

/// Project id embedded in [`service_account_json`].
pub const TEST_PROJECT_ID: &str = "pushgate-test";

/// Client email embedded in [`service_account_json`].
pub const TEST_CLIENT_EMAIL: &str = "dispatch@pushgate-test.iam.gserviceaccount.com";

/// Builder for test notification jobs.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    title: String,
    body: String,
    target: NotificationTarget,
    data: HashMap<String, String>,
}

impl Default for JobBuilder {
    fn default() -> Self {
        Self {
            title: "Test notification".to_string(),
            body: "Test body".to_string(),
            target: NotificationTarget::Device("device-token-0123456789".to_string()),
            data: HashMap::new(),
        }
    }
}

impl JobBuilder {
    /// Creates a builder with sensible defaults targeting a device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the notification title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the notification body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Targets a single device registration token.
    #[must_use]
    pub fn device(mut self, token: impl Into<String>) -> Self {
        self.target = NotificationTarget::Device(token.into());
        self
    }

    /// Targets a topic.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.target = NotificationTarget::Topic(topic.into());
        self
    }

    /// Adds a data payload entry.
    #[must_use]
    pub fn data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Builds the job.
    ///
    /// # Panics
    ///
    /// Panics if the builder holds an empty title, body, or target.
    pub fn build(self) -> NotificationJob {
        NotificationJob::new(self.title, self.body, self.target)
            .expect("JobBuilder produced an invalid job")
            .with_data(self.data)
    }
}

/// Returns `count` device jobs titled `job-0`, `job-1`, ...
pub fn numbered_jobs(count: usize) -> Vec<NotificationJob> {
    (0..count).map(|n| JobBuilder::new().title(format!("job-{n}")).build()).collect()
}

/// Service-account key JSON pointing its token exchange at `token_uri`.
pub fn service_account_json(token_uri: &str) -> Value {
    json!({
        "type": "service_account",
        "project_id": TEST_PROJECT_ID,
        "private_key_id": "0123456789abcdef",
        "private_key": TEST_PRIVATE_KEY_PEM,
        "client_email": TEST_CLIENT_EMAIL,
        "client_id": "100000000000000000000",
        "token_uri": token_uri,
    })
}
