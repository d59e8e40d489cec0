//! Google service account key loading.

use std::{fmt, path::Path};

use serde::Deserialize;

use crate::{
    error::{FcmError, Result},
    DEFAULT_TOKEN_URI,
};

/// Fields of a service account JSON key needed to send through FCM.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Firebase project the messages are sent for.
    pub project_id: String,
    /// PEM encoded RSA private key.
    pub private_key: String,
    /// Key identifier, sent as the assertion's `kid`.
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// Service account identity, the assertion's issuer.
    pub client_email: String,
    /// OAuth2 token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Reads and parses a key file such as the one named by
    /// `GOOGLE_APPLICATION_CREDENTIALS`.
    ///
    /// # Errors
    ///
    /// Returns `CredentialsRead` if the file cannot be read and
    /// `CredentialsParse` if it is not a valid key.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| FcmError::CredentialsRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&contents)
    }

    /// Parses a key from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns `CredentialsParse` if the JSON is malformed or a required
    /// field is missing or empty.
    pub fn from_json(json: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| FcmError::CredentialsParse { message: e.to_string() })?;

        for (field, value) in [
            ("project_id", &key.project_id),
            ("private_key", &key.private_key),
            ("client_email", &key.client_email),
        ] {
            if value.trim().is_empty() {
                return Err(FcmError::CredentialsParse { message: format!("{field} is empty") });
            }
        }

        Ok(key)
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}
