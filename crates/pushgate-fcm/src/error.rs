//! Error types for FCM credential handling and client construction.
//!
//! Errors raised while building the client are fatal to startup. Errors
//! raised while obtaining an access token during a send are converted into
//! [`SendError`] and end up in the worker's log record.

use std::path::PathBuf;

use pushgate_dispatch::SendError;
use thiserror::Error;

/// Result type alias for FCM operations.
pub type Result<T> = std::result::Result<T, FcmError>;

/// FCM client and authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FcmError {
    /// Service account key file could not be read.
    #[error("failed to read service account key {}: {message}", path.display())]
    CredentialsRead {
        /// Path that was read
        path: PathBuf,
        /// I/O error description
        message: String,
    },

    /// Service account key is not valid JSON or lacks required fields.
    #[error("malformed service account key: {message}")]
    CredentialsParse {
        /// Parse error description
        message: String,
    },

    /// Private key is not a usable RSA PEM key.
    #[error("invalid service account private key: {message}")]
    InvalidPrivateKey {
        /// Key decoding error description
        message: String,
    },

    /// Signing the OAuth2 assertion failed.
    #[error("failed to sign token assertion: {message}")]
    TokenSigning {
        /// Signing error description
        message: String,
    },

    /// Token endpoint refused or could not be reached.
    #[error("access token exchange failed: {message}")]
    TokenExchange {
        /// HTTP status of the token endpoint, if one was received
        status_code: Option<u16>,
        /// Error description
        message: String,
    },

    /// HTTP client could not be built.
    #[error("failed to build HTTP client: {message}")]
    HttpClient {
        /// Builder error description
        message: String,
    },
}

impl FcmError {
    /// Creates a token exchange error for an HTTP response.
    pub fn token_rejected(status_code: u16, message: impl Into<String>) -> Self {
        Self::TokenExchange { status_code: Some(status_code), message: message.into() }
    }

    /// Creates a token exchange error for a transport failure.
    pub fn token_unreachable(message: impl Into<String>) -> Self {
        Self::TokenExchange { status_code: None, message: message.into() }
    }
}

impl From<FcmError> for SendError {
    fn from(error: FcmError) -> Self {
        let message = error.to_string();
        match error {
            FcmError::TokenExchange { status_code: Some(status), .. } if status < 500 => {
                Self::authentication(message)
            },
            FcmError::TokenExchange { status_code: Some(status), .. } => {
                Self::unavailable(status, message)
            },
            FcmError::TokenExchange { status_code: None, .. } => Self::network(message),
            FcmError::TokenSigning { .. } => Self::internal(message),
            FcmError::CredentialsRead { .. }
            | FcmError::CredentialsParse { .. }
            | FcmError::InvalidPrivateKey { .. }
            | FcmError::HttpClient { .. } => Self::configuration(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use pushgate_dispatch::ErrorCategory;

    use super::*;

    #[test]
    fn token_failures_map_to_send_categories() {
        let refused: SendError = FcmError::token_rejected(400, "invalid_grant").into();
        assert_eq!(refused.category(), ErrorCategory::Authentication);

        let outage: SendError = FcmError::token_rejected(503, "backend error").into();
        assert_eq!(outage.category(), ErrorCategory::Provider);

        let unreachable: SendError = FcmError::token_unreachable("dns failure").into();
        assert_eq!(unreachable.category(), ErrorCategory::Network);
    }

    #[test]
    fn credential_errors_are_configuration() {
        let error = FcmError::CredentialsRead {
            path: PathBuf::from("/missing.json"),
            message: "No such file or directory".into(),
        };
        assert!(error.to_string().contains("/missing.json"));

        let send_error: SendError = error.into();
        assert_eq!(send_error.category(), ErrorCategory::Configuration);
    }
}
