//! Pushgate push notification service.
//!
//! Main entry point for the pushgate server. Initializes all subsystems
//! and coordinates graceful startup and shutdown.

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use pushgate_api::{start_server, AppState, Config};
use pushgate_dispatch::Dispatcher;
use pushgate_fcm::FcmClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before the configuration so values from the file are honoured
    let dotenv = dotenvy::dotenv();

    let config = Config::load()?;
    init_tracing(&config.rust_log)?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!(error = %e, "Failed to load .env file"),
    }

    info!("Starting pushgate notification service");

    let addr = config.parse_server_addr()?;
    info!(
        server_addr = %addr,
        worker_pool_size = config.worker_pool_size,
        queue_capacity = config.queue_capacity,
        send_timeout_seconds = config.send_timeout_seconds,
        fcm_endpoint = %config.fcm_endpoint,
        "Configuration loaded"
    );

    // The dispatcher must never run without a working sender
    let credentials = &config.google_application_credentials;
    let sender = FcmClient::from_credentials_file(config.to_fcm_config(), credentials)
        .with_context(|| format!("Failed to initialize FCM client from {}", credentials.display()))?;
    info!(project_id = %sender.project_id(), "FCM client initialized");

    let dispatcher = Arc::new(
        Dispatcher::new(config.to_dispatcher_config(), Arc::new(sender))
            .context("Invalid dispatcher configuration")?,
    );
    dispatcher.run().context("Failed to start dispatcher")?;

    let state = AppState::new(dispatcher.clone()).with_request_timeout(config.request_timeout());
    serve_and_drain(&dispatcher, state, addr, config.shutdown_grace(), shutdown_signal()).await?;

    let stats = dispatcher.stats();
    info!(
        delivered = stats.delivered,
        failed = stats.failed,
        rejected = stats.rejected,
        "pushgate shutdown complete"
    );
    Ok(())
}

/// Serves HTTP until `shutdown` resolves or the server exits on its own,
/// then drains the dispatcher.
///
/// The listener is stopped before the drain begins. A server failure is
/// returned only after the drain, so queued notifications still get their
/// attempt.
async fn serve_and_drain(
    dispatcher: &Dispatcher,
    state: AppState,
    addr: SocketAddr,
    grace: Duration,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let token = CancellationToken::new();
    let mut server_handle = tokio::spawn(start_server(state, addr, token.clone()));

    info!(addr = %addr, "pushgate is ready to accept notifications");

    let mut server_result = None;
    tokio::select! {
        () = shutdown => {},
        result = &mut server_handle => {
            warn!("HTTP server exited before a shutdown signal");
            server_result = Some(result);
        },
    }

    // Stop accepting requests before draining the queue
    token.cancel();
    if server_result.is_none() {
        tokio::select! {
            () = tokio::time::sleep(grace) => {
                warn!(grace_seconds = grace.as_secs(), "Shutdown grace period expired");
            },
            result = &mut server_handle => {
                info!("Server stopped");
                server_result = Some(result);
            },
        }
    }

    info!(queued = dispatcher.stats().queued, "Draining notification queue");
    dispatcher.stop().await.context("Dispatcher did not drain cleanly")?;

    if let Some(result) = server_result {
        result.context("HTTP server task panicked")?.context("HTTP server failed")?;
    }
    Ok(())
}

/// Builds the log filter, letting `RUST_LOG` in the environment win over the
/// configured directives.
fn env_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .with_context(|| format!("Invalid log filter: {directives}"))
}

/// Initializes tracing with environment-based configuration.
fn init_tracing(directives: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(env_filter(directives)?).with(fmt_layer).init();
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
