//! prsheet GitHub - pull request access for prsheet
//!
//! This crate reads pull requests, their issue events and their commits from
//! the GitHub REST API, and condenses them into spreadsheet rows or
//! per-account review request counts.

mod client;
mod error;
mod pagination;
mod pulls;
mod summary;

pub use client::{parse_github_url, GitHubClient, GitHubOptions, QuotaStatus};
pub use error::{Error, Result};
pub use pulls::{
    CommitAuthor, CommitDetail, IssueEvent, PrCommit, PrState, PullRequest, PullRequestSource,
    Team, User,
};
pub use summary::{
    compute_tracker_counts, count_commits_after, requested_reviewers, summarize_pr, PrSummary,
    TrackerCounts, ROW_HEADERS, TRACKER_HEADERS,
};
