//! Service account authentication
//!
//! Google's server-to-server flow: sign a short-lived RS256 JWT with the
//! service account's private key and trade it at the token endpoint for a
//! bearer access token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use prsheet_core::ServiceAccountSource;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// OAuth scope granting read/write access to spreadsheets
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service account JSON key that the token flow needs
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parse a JSON key
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Credentials(e.to_string()))
    }

    /// Load the key from wherever the environment points
    pub fn load(source: &ServiceAccountSource) -> Result<Self> {
        let json = source.read()?;

        Self::from_json(&json).map_err(|e| match source {
            ServiceAccountSource::Inline(_) => {
                Error::Credentials(format!("Invalid GOOGLE_SERVICE_ACCOUNT_JSON: {}", e))
            }
            ServiceAccountSource::File(path) => Error::Credentials(format!(
                "Invalid service account file {}: {}",
                path.display(),
                e
            )),
        })
    }

    /// Sign the JWT assertion presented to the token endpoint
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims::new(self, now);
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

impl<'a> Claims<'a> {
    fn new(key: &'a ServiceAccountKey, now: DateTime<Utc>) -> Self {
        let iat = now.timestamp();
        Self {
            iss: &key.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Bearer token with its expiry
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl AccessToken {
    /// Whether the token is expired or within a minute of expiring
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(60) >= self.expires_at
    }

    /// Exchange a signed assertion for an access token
    pub async fn fetch(http: &reqwest::Client, key: &ServiceAccountKey) -> Result<Self> {
        let now = Utc::now();
        let assertion = key.assertion(now)?;

        debug!(client_email = %key.client_email, "Requesting Google access token");

        let response = http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("Unexpected token response: {}", e)))?;

        Ok(Self {
            token: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS)),
        })
    }
}
