//! GitHub API client
//!
//! REST reads go through a single reqwest client so pagination and rate-limit
//! retries see the raw response headers. Octocrab is kept alongside for the
//! typed repository and quota lookups used by `prsheet check`.

use std::time::Duration;

use octocrab::Octocrab;
use prsheet_core::Config;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use tracing::{debug, info};
use url::Url;

use crate::{Error, Result};

const API_VERSION: &str = "2022-11-28";

/// Tunables for a [`GitHubClient`]
#[derive(Debug, Clone)]
pub struct GitHubOptions {
    /// REST API base URL
    pub api_url: String,
    /// Page size for list endpoints
    pub per_page: u8,
    /// Consecutive rate-limit sleeps allowed for one request
    pub rate_limit_retries: u32,
    /// Longest single rate-limit sleep
    pub max_rate_limit_wait: Duration,
}

impl Default for GitHubOptions {
    fn default() -> Self {
        Self {
            api_url: prsheet_core::config::DEFAULT_API_URL.to_string(),
            per_page: 100,
            rate_limit_retries: 5,
            max_rate_limit_wait: Duration::from_secs(15 * 60),
        }
    }
}

impl GitHubOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_url: config.github.api_url.clone(),
            per_page: config.github.per_page.max(1),
            rate_limit_retries: config.sync.rate_limit_retries,
            max_rate_limit_wait: config.sync.max_rate_limit_wait,
        }
    }
}

/// Core API quota as reported by GitHub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub limit: usize,
    pub remaining: usize,
    /// Unix timestamp when the quota resets
    pub reset: u64,
}

/// GitHub API client for one repository
pub struct GitHubClient {
    octocrab: Octocrab,
    http: reqwest::Client,
    api_url: Url,
    owner: String,
    repo: String,
    options: GitHubOptions,
}

impl GitHubClient {
    /// Create a client with default options
    pub fn new(token: &str, owner: impl Into<String>, repo: impl Into<String>) -> Result<Self> {
        Self::with_options(token, owner, repo, GitHubOptions::default())
    }

    /// Create a client for the specified repository
    pub fn with_options(
        token: &str,
        owner: impl Into<String>,
        repo: impl Into<String>,
        options: GitHubOptions,
    ) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();

        if token.trim().is_empty() {
            return Err(Error::Auth("GitHub token is empty".to_string()));
        }

        let api_url = Url::parse(&options.api_url)?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|e| Error::Auth(format!("Invalid GitHub token: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        headers.insert(USER_AGENT, HeaderValue::from_static("prsheet"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        let octocrab = Octocrab::builder()
            .personal_token(token.trim().to_string())
            .base_uri(options.api_url.as_str())?
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(owner = %owner, repo = %repo, api_url = %api_url, "Created GitHub client");

        Ok(Self {
            octocrab,
            http,
            api_url,
            owner,
            repo,
            options,
        })
    }

    /// Get the repository owner
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name
    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn options(&self) -> &GitHubOptions {
        &self.options
    }

    /// Build an API URL from path segments below the base URL
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Parse(format!("Invalid API base URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Test the connection by fetching repository info
    pub async fn test_connection(&self) -> Result<()> {
        debug!(owner = %self.owner, repo = %self.repo, "Testing GitHub connection");

        self.octocrab
            .repos(&self.owner, &self.repo)
            .get()
            .await
            .map_err(|e| match &e {
                octocrab::Error::GitHub { source, .. } if source.message.contains("Not Found") => {
                    Error::RepoNotFound(format!("{}/{}", self.owner, self.repo))
                }
                octocrab::Error::GitHub { source, .. }
                    if source.message.contains("Bad credentials") =>
                {
                    Error::Auth("Invalid GitHub token".to_string())
                }
                _ => Error::Api(e),
            })?;

        info!("GitHub connection successful");
        Ok(())
    }

    /// Fetch the core REST quota
    pub async fn quota(&self) -> Result<QuotaStatus> {
        let limits = self.octocrab.ratelimit().get().await?;
        let core = limits.resources.core;

        Ok(QuotaStatus {
            limit: core.limit,
            remaining: core.remaining,
            reset: core.reset,
        })
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_url", &self.api_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Parse a repository reference into owner and repo
///
/// Supports formats:
/// - owner/repo
/// - https://github.com/owner/repo
/// - git@github.com:owner/repo.git
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    let url = url.trim();

    if !url.contains(':') && !url.contains('/') {
        return Err(Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        )));
    }

    if !url.contains("://") && !url.contains('@') {
        let parts: Vec<&str> = url.split('/').collect();
        if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            return Ok((
                parts[0].to_string(),
                parts[1].trim_end_matches(".git").to_string(),
            ));
        }
        return Err(Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        )));
    }

    if url.starts_with("https://") || url.starts_with("http://") {
        let parsed = Url::parse(url)?;
        let path = parsed.path().trim_start_matches('/').trim_end_matches(".git");
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() >= 2 && !parts[0].is_empty() && !parts[1].is_empty() {
            return Ok((parts[0].to_string(), parts[1].to_string()));
        }
        return Err(Error::Parse(format!("Invalid GitHub URL path: {}", path)));
    }

    if url.starts_with("git@") {
        if let Some(path) = url.split(':').nth(1) {
            let path = path.trim_end_matches(".git");
            let parts: Vec<&str> = path.split('/').collect();
            if parts.len() >= 2 && !parts[0].is_empty() && !parts[1].is_empty() {
                return Ok((parts[0].to_string(), parts[1].to_string()));
            }
        }
        return Err(Error::Parse(format!("Invalid SSH URL: {}", url)));
    }

    Err(Error::Parse(format!("Unrecognized URL format: {}", url)))
}
