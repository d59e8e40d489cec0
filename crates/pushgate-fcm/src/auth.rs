//! OAuth2 access tokens for the FCM HTTP v1 API.
//!
//! [`ServiceAccountTokenProvider`] implements the JWT-bearer grant: it signs
//! a short-lived RS256 assertion with the service account key, exchanges it
//! at the key's token endpoint, and caches the resulting access token until
//! shortly before it expires.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, warn};

use crate::{
    credentials::ServiceAccountKey,
    error::{FcmError, Result},
    FCM_SCOPE,
};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECONDS: i64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Source of bearer tokens for FCM requests.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Returns a currently valid access token.
    async fn access_token(&self) -> Result<String>;
}

/// Fixed token, for tests and externally managed credentials.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wraps a pre-issued access token.
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Access tokens minted from a service account key.
pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    /// Prepares a provider for `key`, exchanging tokens through `http`.
    ///
    /// No network call is made until the first token is requested.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPrivateKey` if the key's PEM is not an RSA key.
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Result<Self> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| FcmError::InvalidPrivateKey { message: e.to_string() })?;

        Ok(Self { key, signing_key, http, cached: Mutex::new(None) })
    }

    /// Builds the signed JWT presented to the token endpoint.
    fn assertion(&self) -> Result<String> {
        let iat = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: FCM_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECONDS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.key.private_key_id);

        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| FcmError::TokenSigning { message: e.to_string() })
    }

    async fn exchange(&self) -> Result<TokenResponse> {
        let assertion = self.assertion()?;
        debug!(token_uri = %self.key.token_uri, "exchanging service account assertion");

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| FcmError::token_unreachable(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| FcmError::token_unreachable(e.to_string()))?;

        if !status.is_success() {
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(error) => match error.error_description {
                    Some(description) => format!("{}: {description}", error.error),
                    None => error.error,
                },
                Err(_) => body,
            };
            warn!(status = status.as_u16(), error = %message, "token endpoint refused assertion");
            return Err(FcmError::token_rejected(status.as_u16(), message));
        }

        serde_json::from_str(&body).map_err(|e| {
            FcmError::token_unreachable(format!("unexpected token endpoint response: {e}"))
        })
    }
}

#[async_trait]
impl AccessTokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String> {
        // Held across the exchange so concurrent workers share one refresh.
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.token.clone());
            }
        }

        let response = self.exchange().await?;
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(REFRESH_MARGIN);
        debug!(expires_in = response.expires_in, "access token refreshed");

        let token = response.access_token;
        *cached = Some(CachedToken { token: token.clone(), refresh_at: Instant::now() + lifetime });
        Ok(token)
    }
}

impl std::fmt::Debug for ServiceAccountTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountTokenProvider")
            .field("client_email", &self.key.client_email)
            .field("token_uri", &self.key.token_uri)
            .finish_non_exhaustive()
    }
}
