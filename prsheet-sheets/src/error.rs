//! Error types for Google Sheets operations

use thiserror::Error;

/// Result type for Sheets operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to Google Sheets
#[derive(Error, Debug)]
pub enum Error {
    /// Transport error
    #[error("Sheets request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Google API returned {status} for {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// Service account key missing or malformed
    #[error("{0}")]
    Credentials(String),

    /// Signing the token request failed
    #[error("Failed to sign service account assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Token exchange rejected
    #[error("Google authentication error: {0}")]
    Auth(String),

    /// Unexpected response shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Worksheet state is unusable
    #[error("Worksheet error: {0}")]
    Worksheet(String),

    /// Configuration error from prsheet-core
    #[error(transparent)]
    Core(#[from] prsheet_core::Error),
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
