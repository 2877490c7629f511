//! Condensing pull request activity into sheet rows and tracker counts
//!
//! A pull request counts as "marked done" once a review is first requested on
//! it. Commits authored after that moment are treated as follow-up work.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use prsheet_core::{Cell, Row, TrackBy};
use tracing::{debug, info};

use crate::pulls::{IssueEvent, PrCommit, PrState, PullRequest, PullRequestSource};
use crate::Result;

/// Header row written above per-PR rows
pub const ROW_HEADERS: [&str; 10] = [
    "PR #",
    "Task Title",
    "Creator",
    "Created At",
    "Marked Done (Review Requested)",
    "Reviewers",
    "Updates After Done",
    "Finalized By",
    "Finalized At",
    "PR URL",
];

/// Header row written above tracker counts
pub const TRACKER_HEADERS: [&str; 2] = ["Account", "Count"];

/// One pull request flattened for the spreadsheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrSummary {
    pub number: u64,
    pub title: String,
    pub creator: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Time of the first review request
    pub marked_done_at: Option<DateTime<Utc>>,
    /// Requested reviewers in request order, without duplicates
    pub reviewers: Vec<String>,
    /// Commits authored after `marked_done_at`
    pub updates_after_done: usize,
    pub finalized_by: Option<String>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

impl PrSummary {
    /// Cells in [`ROW_HEADERS`] order
    pub fn to_row(&self) -> Row {
        vec![
            Cell::from(self.number),
            Cell::from(self.title.as_str()),
            Cell::from(self.creator.clone()),
            timestamp_cell(self.created_at),
            timestamp_cell(self.marked_done_at),
            if self.reviewers.is_empty() {
                Cell::Empty
            } else {
                Cell::Text(self.reviewers.join(", "))
            },
            Cell::from(self.updates_after_done),
            Cell::from(self.finalized_by.clone()),
            timestamp_cell(self.finalized_at),
            Cell::from(self.url.clone()),
        ]
    }
}

fn timestamp_cell(value: Option<DateTime<Utc>>) -> Cell {
    value
        .map(|t| Cell::Text(t.to_rfc3339_opts(SecondsFormat::Secs, true)))
        .unwrap_or(Cell::Empty)
}

/// Requested reviewers across review request events
///
/// Keeps the first occurrence of each reviewer and drops later repeats.
pub fn requested_reviewers<'a, I>(events: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a IssueEvent>,
{
    let mut reviewers: Vec<String> = Vec::new();
    for label in events.into_iter().filter_map(IssueEvent::reviewer_label) {
        if !reviewers.contains(&label) {
            reviewers.push(label);
        }
    }
    reviewers
}

/// Number of commits authored strictly after `since`
pub fn count_commits_after(commits: &[PrCommit], since: DateTime<Utc>) -> usize {
    commits
        .iter()
        .filter_map(PrCommit::authored_at)
        .filter(|authored| *authored > since)
        .count()
}

/// Build the spreadsheet summary for one pull request
///
/// Commits are only fetched when the PR has a review request. When a merged
/// PR comes from the list endpoint without `merged_by`, the single-PR
/// endpoint is asked for it.
pub async fn summarize_pr<S>(source: &S, pr: &PullRequest) -> Result<PrSummary>
where
    S: PullRequestSource + ?Sized,
{
    let events = source.issue_events(pr.number).await?;
    let review_requests: Vec<&IssueEvent> =
        events.iter().filter(|e| e.is_review_request()).collect();

    let marked_done_at = review_requests.first().and_then(|e| e.created_at);
    let reviewers = requested_reviewers(review_requests.iter().copied());

    let updates_after_done = match marked_done_at {
        Some(done) => {
            let commits = source.pr_commits(pr.number).await?;
            count_commits_after(&commits, done)
        }
        None => 0,
    };

    let finalized_by = if pr.is_merged() {
        match &pr.merged_by {
            Some(user) => Some(user.login.clone()),
            None => source
                .pull_request(pr.number)
                .await?
                .merged_by
                .map(|u| u.login),
        }
    } else {
        None
    };

    let finalized_at = pr.merged_at.or(match pr.state {
        PrState::Closed => pr.closed_at,
        PrState::Open => None,
    });

    debug!(
        number = pr.number,
        review_requests = review_requests.len(),
        updates_after_done,
        "Summarized pull request"
    );

    Ok(PrSummary {
        number: pr.number,
        title: pr.title.clone(),
        creator: pr.author().map(str::to_owned),
        created_at: pr.created_at,
        marked_done_at,
        reviewers,
        updates_after_done,
        finalized_by,
        finalized_at,
        url: pr.html_url.clone(),
    })
}

/// Review request counts per account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerCounts {
    counts: BTreeMap<String, u64>,
}

impl TrackerCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit one review request to `account`
    pub fn record(&mut self, account: &str) {
        *self.counts.entry(account.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, account: &str) -> u64 {
        self.counts.get(account).copied().unwrap_or(0)
    }

    /// Number of distinct accounts
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Accounts ordered by count descending, then name case-insensitively
    pub fn sorted(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> =
            self.counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        entries.sort_by(|(a_name, a_count), (b_name, b_count)| {
            b_count
                .cmp(a_count)
                .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
                .then_with(|| a_name.cmp(b_name))
        });
        entries
    }

    /// `[account, count]` rows in [`TrackerCounts::sorted`] order
    pub fn to_rows(&self) -> Vec<Row> {
        self.sorted()
            .into_iter()
            .map(|(account, count)| vec![Cell::from(account), Cell::Number(count as i64)])
            .collect()
    }
}

/// Count review requests per account across pull requests
///
/// Only a PR's first review request counts, and PRs without one are skipped.
/// The account is the PR author or the requester depending on `track_by`.
pub async fn compute_tracker_counts<S>(
    source: &S,
    prs: &[PullRequest],
    track_by: TrackBy,
) -> Result<TrackerCounts>
where
    S: PullRequestSource + ?Sized,
{
    let mut counts = TrackerCounts::new();

    for pr in prs {
        let events = source.issue_events(pr.number).await?;
        let Some(first) = events.iter().find(|e| e.is_review_request()) else {
            continue;
        };

        let account = match track_by {
            TrackBy::Creator => pr.author(),
            TrackBy::Requester => first.actor_login(),
        };

        match account.filter(|a| !a.is_empty()) {
            Some(account) => counts.record(account),
            None => debug!(number = pr.number, "No account to credit, skipping"),
        }
    }

    info!(accounts = counts.len(), %track_by, "Computed tracker counts");
    Ok(counts)
}
