//! Firebase Cloud Messaging sender.
//!
//! Implements the dispatch engine's [`PushSender`](pushgate_dispatch::PushSender)
//! on top of the FCM HTTP v1 API, authenticated with a Google service
//! account through the OAuth2 JWT-bearer grant.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;

pub use auth::{AccessTokenProvider, ServiceAccountTokenProvider, StaticTokenProvider};
pub use client::{FcmClient, FcmConfig};
pub use credentials::ServiceAccountKey;
pub use error::{FcmError, Result};

/// OAuth2 scope required to send messages.
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Production FCM API base URL.
pub const DEFAULT_FCM_ENDPOINT: &str = "https://fcm.googleapis.com";

/// Google's OAuth2 token endpoint, used when a key does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
