//! Error types for GitHub operations

use thiserror::Error;

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during GitHub operations
#[derive(Error, Debug)]
pub enum Error {
    /// GitHub API error reported through octocrab
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    /// Transport error from the REST client
    #[error("GitHub request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("GitHub returned {status} for {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// Authentication error
    #[error("GitHub authentication error: {0}")]
    Auth(String),

    /// Repository missing or not visible with the token
    #[error("Repository {0} not found or not accessible")]
    RepoNotFound(String),

    /// Rate limit still exhausted after the allowed retries
    #[error("GitHub rate limit exceeded: {0}")]
    RateLimited(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
