//! Pushgate HTTP API.
//!
//! Accepts notification requests over HTTP and hands them to the dispatch
//! engine. A request is answered as soon as the dispatcher admits or
//! rejects it; delivery happens afterwards on the worker pool.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::{sync::Arc, time::Duration};

use pushgate_dispatch::Dispatcher;

pub mod config;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use server::{create_router, start_server};

/// Shared state available to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Dispatcher receiving admitted notifications.
    pub dispatcher: Arc<Dispatcher>,
    /// Upper bound on a single request's handling time.
    pub request_timeout: Duration,
}

impl AppState {
    /// Creates state with the default 30 second request timeout.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher, request_timeout: Duration::from_secs(30) }
    }

    /// Overrides the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}
