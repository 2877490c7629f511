//! Pull requests, their issue events and their commits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{GitHubClient, Result};

/// Event name GitHub records when a reviewer or team is requested
pub const REVIEW_REQUESTED: &str = "review_requested";

/// A GitHub account reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

/// A team reference on a review request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(default)]
    pub slug: Option<String>,
}

/// PR state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
}

/// Pull request as returned by the list and get endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    /// Author
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub html_url: Option<String>,
    pub state: PrState,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    /// Only populated by the single-PR endpoint
    #[serde(default)]
    pub merged_by: Option<User>,
}

impl PullRequest {
    /// Author login, if the account still exists
    pub fn author(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.login.as_str())
    }

    pub fn is_merged(&self) -> bool {
        self.merged_at.is_some()
    }
}

/// Entry from the issue events timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueEvent {
    pub event: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actor: Option<User>,
    #[serde(default)]
    pub requested_reviewer: Option<User>,
    #[serde(default)]
    pub requested_team: Option<Team>,
}

impl IssueEvent {
    pub fn is_review_request(&self) -> bool {
        self.event == REVIEW_REQUESTED
    }

    /// Who asked for the review
    pub fn actor_login(&self) -> Option<&str> {
        self.actor.as_ref().map(|u| u.login.as_str())
    }

    /// Reviewer label: the user login, or `team:<slug>` for team requests
    pub fn reviewer_label(&self) -> Option<String> {
        if let Some(user) = &self.requested_reviewer {
            return Some(user.login.clone()).filter(|l| !l.is_empty());
        }
        self.requested_team
            .as_ref()
            .and_then(|t| t.slug.as_deref())
            .filter(|s| !s.is_empty())
            .map(|slug| format!("team:{}", slug))
    }
}

/// Git author block of a commit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

/// Git-level commit data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub author: Option<CommitAuthor>,
}

/// Commit listed on a pull request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrCommit {
    pub sha: String,
    pub commit: CommitDetail,
}

impl PrCommit {
    /// Git author date
    pub fn authored_at(&self) -> Option<DateTime<Utc>> {
        self.commit.author.as_ref().and_then(|a| a.date)
    }
}

/// Read access to the pull request data a sync run needs
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// All pull requests in the given state, newest first
    async fn list_pull_requests(&self, state: &str) -> Result<Vec<PullRequest>>;

    /// One pull request with full detail
    async fn pull_request(&self, number: u64) -> Result<PullRequest>;

    /// Issue timeline events for a pull request
    async fn issue_events(&self, number: u64) -> Result<Vec<IssueEvent>>;

    /// Commits on a pull request
    async fn pr_commits(&self, number: u64) -> Result<Vec<PrCommit>>;
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn list_pull_requests(&self, state: &str) -> Result<Vec<PullRequest>> {
        debug!(state, "Listing pull requests");

        let url = self.endpoint(&["repos", self.owner(), self.repo(), "pulls"])?;
        let params = [("state", state), ("sort", "created"), ("direction", "desc")];
        let prs: Vec<PullRequest> = self.paginate(url, &params).await?;

        info!(count = prs.len(), "Fetched pull requests");
        Ok(prs)
    }

    async fn pull_request(&self, number: u64) -> Result<PullRequest> {
        debug!(number, "Fetching pull request");

        let number = number.to_string();
        let url = self.endpoint(&["repos", self.owner(), self.repo(), "pulls", number.as_str()])?;
        self.get_json(url).await
    }

    async fn issue_events(&self, number: u64) -> Result<Vec<IssueEvent>> {
        let number = number.to_string();
        let url = self.endpoint(&[
            "repos",
            self.owner(),
            self.repo(),
            "issues",
            number.as_str(),
            "events",
        ])?;
        self.paginate(url, &[]).await
    }

    async fn pr_commits(&self, number: u64) -> Result<Vec<PrCommit>> {
        let number = number.to_string();
        let url = self.endpoint(&[
            "repos",
            self.owner(),
            self.repo(),
            "pulls",
            number.as_str(),
            "commits",
        ])?;
        self.paginate(url, &[]).await
    }
}
