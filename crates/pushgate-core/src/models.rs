//! Notification job model and strongly-typed identifiers.
//!
//! A [`NotificationJob`] is an immutable value describing one requested push
//! delivery. Once admitted it is owned by the dispatch queue, then by the
//! worker that claims it, and is dropped after its single delivery attempt.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PushgateError, Result};

/// Number of leading device-token characters kept when redacting for logs.
const REDACTED_TOKEN_PREFIX: usize = 6;

/// Prefix accepted (and stripped) in front of topic names.
const TOPIC_PATH_PREFIX: &str = "/topics/";

/// Strongly-typed job identifier.
///
/// Assigned when a request is accepted at the HTTP boundary and used only to
/// correlate log records; the dispatch engine never looks jobs up by id.
///
/// # Example
///
/// ```
/// use pushgate_core::JobId;
/// let job_id = JobId::new();
/// println!("Queued job: {}", job_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Creates a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier the push provider assigns to an accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(String);

impl DeliveryId {
    /// Wraps a provider-assigned message name.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeliveryId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Where a notification is sent: a single device or every subscriber of a
/// topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NotificationTarget {
    /// Registration token of one device.
    Device(String),
    /// Topic name without the `/topics/` prefix.
    Topic(String),
}

impl NotificationTarget {
    /// Builds a target from the wire representation (`target` + `is_topic`).
    ///
    /// Topic names may be given with or without the `/topics/` prefix.
    pub fn from_parts(target: impl Into<String>, is_topic: bool) -> Self {
        let target = target.into();
        if is_topic {
            let name = target.strip_prefix(TOPIC_PATH_PREFIX).map(str::to_owned).unwrap_or(target);
            Self::Topic(name)
        } else {
            Self::Device(target)
        }
    }

    /// Returns the token or topic name.
    pub fn value(&self) -> &str {
        match self {
            Self::Device(token) => token,
            Self::Topic(name) => name,
        }
    }

    /// Returns `true` when the target is a topic.
    pub fn is_topic(&self) -> bool {
        matches!(self, Self::Topic(_))
    }

    /// Returns a representation safe for log records.
    ///
    /// Device tokens are credentials for reaching a handset and are cut to a
    /// short prefix; topic names are public and kept verbatim.
    pub fn redacted(&self) -> String {
        match self {
            Self::Device(token) => {
                let prefix: String = token.chars().take(REDACTED_TOKEN_PREFIX).collect();
                if token.chars().count() <= REDACTED_TOKEN_PREFIX {
                    "device:***".to_string()
                } else {
                    format!("device:{prefix}***")
                }
            },
            Self::Topic(name) => format!("topic:{name}"),
        }
    }
}

impl fmt::Display for NotificationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// One requested push delivery.
///
/// Fields are private so a job cannot change between admission and delivery.
/// Title, body, and target are guaranteed non-blank by [`NotificationJob::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationJob {
    id: JobId,
    title: String,
    body: String,
    target: NotificationTarget,
    data: HashMap<String, String>,
}

impl NotificationJob {
    /// Creates a job after checking the required text fields.
    ///
    /// # Errors
    ///
    /// Returns [`PushgateError::InvalidPayload`] if the title, body, or
    /// target is empty or whitespace-only.
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        target: NotificationTarget,
    ) -> Result<Self> {
        let title = title.into();
        let body = body.into();

        if title.trim().is_empty() {
            return Err(PushgateError::invalid_payload("title is required"));
        }
        if body.trim().is_empty() {
            return Err(PushgateError::invalid_payload("body is required"));
        }
        if target.value().trim().is_empty() {
            return Err(PushgateError::invalid_payload("target is required"));
        }

        Ok(Self { id: JobId::new(), title, body, target, data: HashMap::new() })
    }

    /// Attaches the optional key/value data payload.
    #[must_use]
    pub fn with_data(mut self, data: HashMap<String, String>) -> Self {
        self.data = data;
        self
    }

    /// Returns the correlation id assigned at creation.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Returns the notification title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the notification body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the delivery target.
    pub fn target(&self) -> &NotificationTarget {
        &self.target
    }

    /// Returns the custom data payload (possibly empty).
    pub fn data(&self) -> &HashMap<String, String> {
        &self.data
    }
}
