//! Error types for job admission, dispatcher lifecycle, and delivery.
//!
//! [`DispatchError`] is returned synchronously to whoever drives the
//! dispatcher. [`SendError`] is what a [`PushSender`](crate::PushSender)
//! reports for a failed delivery attempt; it never leaves the worker that
//! observed it.

use std::{fmt, time::Duration};

use pushgate_core::PushgateError;
use thiserror::Error;

use crate::dispatcher::DispatcherState;

/// Result type alias for dispatcher operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors surfaced by the dispatcher to its callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Queue held `capacity` jobs when admission was attempted.
    #[error("job queue full: capacity of {capacity} reached")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Submission outside the running state.
    #[error("dispatcher is {state}, jobs can only be submitted while running")]
    NotRunning {
        /// State observed at submission time
        state: DispatcherState,
    },

    /// `run` called on a dispatcher that already left the idle state.
    #[error("dispatcher already started (state: {state})")]
    AlreadyStarted {
        /// State observed when `run` was called
        state: DispatcherState,
    },

    /// Construction or startup parameters are unusable.
    #[error("invalid dispatcher configuration: {message}")]
    InvalidConfiguration {
        /// Configuration error message
        message: String,
    },

    /// A worker task panicked outside a sender call.
    #[error("worker {worker_id} panicked: {error}")]
    WorkerPanic {
        /// Pool slot of the failed worker
        worker_id: usize,
        /// Panic or join error description
        error: String,
    },
}

impl DispatchError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration { message: message.into() }
    }

    /// Returns `true` for errors caused by calling the dispatcher in the
    /// wrong lifecycle state.
    pub fn is_lifecycle_misuse(&self) -> bool {
        matches!(self, Self::NotRunning { .. } | Self::AlreadyStarted { .. })
    }
}

impl From<DispatchError> for PushgateError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::QueueFull { capacity } => Self::QueueFull { capacity },
            DispatchError::NotRunning { state } => Self::NotAccepting { state: state.to_string() },
            other => Self::internal(other.to_string()),
        }
    }
}

/// Failure reported by a sender for one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Network-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// The call did not complete within its deadline.
    #[error("send timed out after {timeout_ms}ms")]
    Timeout {
        /// Deadline that was exceeded in milliseconds
        timeout_ms: u64,
    },

    /// Provider refused our credentials (401/403).
    #[error("provider authentication failed: {message}")]
    Authentication {
        /// Provider error message
        message: String,
    },

    /// Provider rejected the message itself (4xx), e.g. an unregistered
    /// device token.
    #[error("provider rejected message: HTTP {status_code}: {message}")]
    Rejected {
        /// HTTP status code (4xx)
        status_code: u16,
        /// Provider error message
        message: String,
    },

    /// Provider quota exceeded (429).
    #[error("provider rate limited: {message}")]
    RateLimited {
        /// Retry-After hint from the provider, recorded for logs only
        retry_after_seconds: Option<u64>,
        /// Provider error message
        message: String,
    },

    /// Provider failed to process the request (5xx).
    #[error("provider unavailable: HTTP {status_code}: {message}")]
    Unavailable {
        /// HTTP status code (5xx)
        status_code: u16,
        /// Provider error message
        message: String,
    },

    /// Sender is misconfigured.
    #[error("sender configuration error: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Unexpected internal error, including a panicking sender.
    #[error("internal sender error: {message}")]
    Internal {
        /// Internal error message
        message: String,
    },
}

impl SendError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error for the given deadline.
    pub fn timeout(deadline: Duration) -> Self {
        Self::Timeout { timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX) }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication { message: message.into() }
    }

    /// Creates a rejection error from a 4xx response.
    pub fn rejected(status_code: u16, message: impl Into<String>) -> Self {
        Self::Rejected { status_code, message: message.into() }
    }

    /// Creates a rate limit error.
    pub fn rate_limited(retry_after_seconds: Option<u64>, message: impl Into<String>) -> Self {
        Self::RateLimited { retry_after_seconds, message: message.into() }
    }

    /// Creates an unavailability error from a 5xx response.
    pub fn unavailable(status_code: u16, message: impl Into<String>) -> Self {
        Self::Unavailable { status_code, message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Returns the category used for log and metric labels.
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from(self)
    }
}

/// Category of send error for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network connectivity issues and timeouts.
    Network,
    /// Credential problems.
    Authentication,
    /// Message rejected by the provider.
    Rejected,
    /// Provider quota.
    RateLimit,
    /// Provider-side failures.
    Provider,
    /// Configuration problems.
    Configuration,
    /// Internal system errors.
    Internal,
}

impl From<&SendError> for ErrorCategory {
    fn from(error: &SendError) -> Self {
        match error {
            SendError::Network { .. } | SendError::Timeout { .. } => Self::Network,
            SendError::Authentication { .. } => Self::Authentication,
            SendError::Rejected { .. } => Self::Rejected,
            SendError::RateLimited { .. } => Self::RateLimit,
            SendError::Unavailable { .. } => Self::Provider,
            SendError::Configuration { .. } => Self::Configuration,
            SendError::Internal { .. } => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Authentication => write!(f, "authentication"),
            Self::Rejected => write!(f, "rejected"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Provider => write!(f, "provider"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
