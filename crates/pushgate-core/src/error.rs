//! Client-facing error taxonomy.
//!
//! Every error returned across the HTTP boundary carries a stable code so
//! callers can tell a malformed request apart from a temporarily saturated
//! service without parsing messages.

use thiserror::Error;

/// Result type alias using `PushgateError`.
pub type Result<T> = std::result::Result<T, PushgateError>;

/// Pushgate error types with stable codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushgateError {
    // Request errors (E1xxx)
    /// Request body malformed or missing a required field (E1001).
    #[error("[E1001] Invalid payload: {reason}")]
    InvalidPayload {
        /// What was wrong with the payload
        reason: String,
    },

    /// Dispatch queue is at capacity (E1002).
    #[error("[E1002] Queue full: {capacity} notifications already waiting, retry later")]
    QueueFull {
        /// Configured queue capacity
        capacity: usize,
    },

    /// Dispatcher is not running, typically during shutdown (E1003).
    #[error("[E1003] Not accepting notifications: dispatcher is {state}")]
    NotAccepting {
        /// Lifecycle state reported by the dispatcher
        state: String,
    },

    // System errors (E3xxx)
    /// Unexpected internal failure (E3001).
    #[error("[E3001] Internal error: {message}")]
    Internal {
        /// Internal error message
        message: String,
    },
}

impl PushgateError {
    /// Creates an invalid payload error.
    pub fn invalid_payload(reason: impl Into<String>) -> Self {
        Self::InvalidPayload { reason: reason.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Returns the error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload { .. } => "E1001",
            Self::QueueFull { .. } => "E1002",
            Self::NotAccepting { .. } => "E1003",
            Self::Internal { .. } => "E3001",
        }
    }

    /// Returns whether the caller may resubmit the same request later.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::NotAccepting { .. })
    }
}
