//! Notification submission handler.
//!
//! Validates the payload, builds a notification job, and offers it to the
//! dispatcher without waiting for delivery.

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pushgate_core::{NotificationJob, NotificationTarget, PushgateError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::AppState;

/// Request body for `POST /send-fcm`.
#[derive(Debug, Deserialize)]
pub struct SendNotificationRequest {
    /// Notification title
    pub title: String,
    /// Notification body text
    pub body: String,
    /// Device registration token, or topic name when `is_topic` is set
    pub target: String,
    /// Whether `target` names a topic
    #[serde(default)]
    pub is_topic: bool,
    /// Additional key/value data delivered with the notification
    #[serde(default)]
    pub data: Option<HashMap<String, String>>,
}

/// Response for an admitted notification.
#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    /// Always `queued`
    pub status: &'static str,
    /// Identifier for correlating delivery logs
    pub job_id: String,
    /// Human-readable summary
    pub message: &'static str,
}

/// Error response with code and message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details including code and message
    pub error: ErrorDetail,
}

/// Detailed error information.
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code from the taxonomy (E1001-E3001)
    pub code: String,
    /// Human-readable error description
    pub message: String,
}

/// Queues a push notification for asynchronous delivery.
///
/// # Errors
///
/// Returns appropriate HTTP status codes:
/// - 400: Malformed JSON or missing/empty title, body, or target (E1001)
/// - 503: Queue full (E1002) or dispatcher not running (E1003)
#[instrument(name = "send_notification", skip(state, payload))]
pub async fn send_notification(
    State(state): State<AppState>,
    payload: Result<Json<SendNotificationRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected malformed notification payload");
            return create_error_response(
                StatusCode::BAD_REQUEST,
                &PushgateError::invalid_payload(rejection.body_text()),
            );
        },
    };

    let target = NotificationTarget::from_parts(request.target, request.is_topic);
    let job = match NotificationJob::new(request.title, request.body, target) {
        Ok(job) => job.with_data(request.data.unwrap_or_default()),
        Err(e) => {
            warn!(error = %e, "Rejected invalid notification payload");
            return create_error_response(StatusCode::BAD_REQUEST, &e);
        },
    };

    let job_id = job.id();
    let target = job.target().redacted();
    debug!(job_id = %job_id, target = %target, "Submitting notification");

    match state.dispatcher.submit(job) {
        Ok(()) => {
            info!(job_id = %job_id, target = %target, "Notification queued");
            (
                StatusCode::ACCEPTED,
                Json(SendNotificationResponse {
                    status: "queued",
                    job_id: job_id.to_string(),
                    message: "Notification accepted for delivery",
                }),
            )
                .into_response()
        },
        Err(e) => {
            let error = PushgateError::from(e);
            let status = if error.is_retryable() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            warn!(job_id = %job_id, code = error.code(), error = %error, "Notification not queued");
            create_error_response(status, &error)
        },
    }
}

/// Builds the JSON error body for `error` with `status`.
pub(crate) fn create_error_response(status: StatusCode, error: &PushgateError) -> Response {
    let error_response = ErrorResponse {
        error: ErrorDetail { code: error.code().to_string(), message: error.to_string() },
    };

    (status, Json(error_response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_includes_code() {
        let error = PushgateError::QueueFull { capacity: 5000 };
        let response = create_error_response(StatusCode::SERVICE_UNAVAILABLE, &error);

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn optional_fields_default() {
        let request: SendNotificationRequest =
            serde_json::from_str(r#"{"title":"t","body":"b","target":"abc"}"#).unwrap();

        assert!(!request.is_topic);
        assert!(request.data.is_none());
    }
}
