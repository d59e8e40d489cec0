//! Router assembly and the HTTP listener.
//!
//! Every request is tagged with an `X-Request-Id` (reused when the client
//! sent one), traced, and cut off after the configured request timeout.
//!
//! # Graceful Shutdown
//!
//! The server stops accepting connections once its cancellation token
//! fires and returns after in-flight requests complete. Draining the
//! dispatcher is left to the caller, after the listener is closed.

use std::net::SocketAddr;

use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;
use uuid::Uuid;

use crate::{handlers, AppState};

/// Creates the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use pushgate_api::{create_router, AppState};
/// use pushgate_dispatch::Dispatcher;
///
/// fn build(dispatcher: Arc<Dispatcher>) -> axum::Router {
///     create_router(AppState::new(dispatcher))
/// }
/// ```
pub fn create_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check));

    let api_routes = Router::new().route("/send-fcm", post(handlers::send_notification));

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
///
/// Reuses an incoming `X-Request-Id` so ids propagate across services.
async fn inject_request_id(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);

    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server and serves until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound or the server
/// fails while serving.
pub async fn start_server(
    state: AppState,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{self, StatusCode},
    };
    use pushgate_dispatch::{Dispatcher, DispatcherConfig};
    use pushgate_testing::RecordingSender;
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        let dispatcher =
            Dispatcher::new(DispatcherConfig::default(), Arc::new(RecordingSender::new())).unwrap();
        create_router(AppState::new(Arc::new(dispatcher)))
    }

    #[tokio::test]
    async fn request_id_is_generated() {
        let response = router()
            .oneshot(http::Request::builder().uri("/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers().get("x-request-id").expect("request id header");
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn incoming_request_id_is_echoed() {
        let request = http::Request::builder()
            .uri("/live")
            .header("x-request-id", "trace-abc-123")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.headers()["x-request-id"], "trace-abc-123");
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let response = router()
            .oneshot(http::Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
