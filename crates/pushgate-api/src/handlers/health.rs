//! Probe endpoints reporting dispatcher health.
//!
//! Provides liveness, readiness, and health endpoints for orchestration
//! systems like Kubernetes. The service is only ready while the dispatcher
//! accepts notifications, so load balancers stop routing to an instance as
//! soon as it starts draining.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use pushgate_dispatch::{DispatchStats, DispatcherState};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall verdict
    pub status: HealthStatus,
    /// When the report was produced
    pub timestamp: DateTime<Utc>,
    /// Per-component detail
    pub checks: HealthChecks,
    /// Crate version of the running binary
    pub version: String,
}

/// Overall verdict of a health report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting and delivering notifications
    Healthy,
    /// Not accepting notifications
    Unhealthy,
}

/// Per-component results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Dispatch engine state and occupancy
    pub dispatcher: DispatcherHealth,
}

/// Dispatcher component health.
#[derive(Debug, Serialize)]
pub struct DispatcherHealth {
    /// Lifecycle state
    pub state: DispatcherState,
    /// Jobs waiting in the queue
    pub queued: usize,
    /// Queue capacity
    pub capacity: usize,
    /// Workers still running
    pub active_workers: usize,
    /// Deliveries in progress
    pub in_flight: usize,
}

impl DispatcherHealth {
    fn new(state: DispatcherState, stats: DispatchStats) -> Self {
        Self {
            state,
            queued: stats.queued,
            capacity: stats.capacity,
            active_workers: stats.active_workers,
            in_flight: stats.in_flight,
        }
    }
}

/// `GET /health`: full status report.
///
/// Cheap enough to be polled frequently: it only reads dispatcher state and
/// atomic counters.
#[instrument(name = "health_check", skip(app_state))]
pub async fn health_check(State(app_state): State<AppState>) -> Response {
    let state = app_state.dispatcher.state();
    let stats = app_state.dispatcher.stats();

    let status = if state == DispatcherState::Running {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    let response = HealthResponse {
        status,
        timestamp: Utc::now(),
        checks: HealthChecks { dispatcher: DispatcherHealth::new(state, stats) },
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    debug!(status = ?response.status, dispatcher_state = %state, "Health check completed");

    let status_code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response)).into_response()
}

/// `GET /ready`: whether this instance should receive traffic.
#[instrument(name = "readiness_check", skip(app_state))]
pub async fn readiness_check(State(app_state): State<AppState>) -> Response {
    let state = app_state.dispatcher.state();
    let status_code = if state == DispatcherState::Running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = serde_json::json!({
        "ready": status_code == StatusCode::OK,
        "dispatcher": state,
    });

    (status_code, Json(response)).into_response()
}

/// `GET /live`: process liveness.
///
/// Only reports that the HTTP server is responding.
#[instrument(name = "liveness_check")]
pub async fn liveness_check() -> Response {
    let response = serde_json::json!({
        "status": "alive",
        "timestamp": Utc::now(),
        "service": "pushgate",
    });

    (StatusCode::OK, Json(response)).into_response()
}
