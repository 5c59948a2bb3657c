//! Registry credentials and the `X-Registry-Auth` encoding

use crate::error::{MigrateError, Result};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Username/password pair for a registry. The password never appears in
/// `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decode a base64 `user:password` token, as returned by ECR's
    /// GetAuthorizationToken. The split happens at the first `:`.
    pub fn from_basic_token(token: &str) -> Result<Self> {
        let decoded = STANDARD
            .decode(token.trim())
            .map_err(|e| MigrateError::Auth(format!("Failed to decode auth token: {}", e)))?;
        let decoded = String::from_utf8(decoded)
            .map_err(|_| MigrateError::Auth("Auth token is not valid UTF-8".to_string()))?;

        match decoded.split_once(':') {
            Some((username, password)) if !username.is_empty() => {
                Ok(Self::new(username, password))
            }
            _ => Err(MigrateError::Auth(
                "Auth token is not in user:password form".to_string(),
            )),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct AuthConfig<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct OwnedAuthConfig {
    username: String,
    password: String,
}

/// Encodes credentials into the token the Docker Engine API expects in the
/// `X-Registry-Auth` header: JSON, then URL-safe base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    pub fn encode(credential: &Credential) -> Result<String> {
        let json = serde_json::to_vec(&AuthConfig {
            username: &credential.username,
            password: &credential.password,
        })?;
        Ok(URL_SAFE.encode(json))
    }

    /// Inverse of [`Authorizer::encode`]
    pub fn decode(token: &str) -> Result<Credential> {
        let json = URL_SAFE
            .decode(token.trim())
            .map_err(|e| MigrateError::Auth(format!("Failed to decode registry auth: {}", e)))?;
        let config: OwnedAuthConfig = serde_json::from_slice(&json)?;
        Ok(Credential::new(config.username, config.password))
    }
}
