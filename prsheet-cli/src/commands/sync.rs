//! Sync command - write pull request data to the spreadsheet

use anyhow::Context;
use clap::Args;
use prsheet_core::{CliOverrides, Config, Mode, ServiceAccountSource, TrackBy};
use prsheet_github::{
    compute_tracker_counts, summarize_pr, PullRequest, PullRequestSource, ROW_HEADERS,
    TRACKER_HEADERS,
};
use prsheet_sheets::{ensure_headers, MemoryWorksheet, SheetsClient, Worksheet};
use tracing::info;

use super::{github_client, short_id};

/// Sync pull requests into the spreadsheet
#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// rows: one row per PR; tracker: review requests per account
    #[arg(long, value_parser = parse_mode)]
    mode: Option<Mode>,

    /// Tracker accounting: creator (PR author) or requester
    #[arg(long, value_parser = parse_track_by)]
    track_by: Option<TrackBy>,

    /// Worksheet for rows mode (overrides SHEET_NAME)
    #[arg(long)]
    sheet_name: Option<String>,

    /// Worksheet for tracker mode (overrides TRACKER_SHEET_NAME)
    #[arg(long)]
    tracker_sheet_name: Option<String>,

    /// Print the resulting sheet contents instead of writing to Google
    #[arg(long)]
    dry_run: bool,
}

fn parse_mode(s: &str) -> Result<Mode, String> {
    s.parse().map_err(|e: prsheet_core::Error| e.to_string())
}

fn parse_track_by(s: &str) -> Result<TrackBy, String> {
    s.parse().map_err(|e: prsheet_core::Error| e.to_string())
}

impl SyncArgs {
    /// Copy flag values into the config overrides
    pub fn apply(&self, overrides: &mut CliOverrides) {
        overrides.mode = self.mode.or(overrides.mode);
        overrides.track_by = self.track_by.or(overrides.track_by);
        if self.sheet_name.is_some() {
            overrides.sheet_name = self.sheet_name.clone();
        }
        if self.tracker_sheet_name.is_some() {
            overrides.tracker_sheet_name = self.tracker_sheet_name.clone();
        }
    }

    /// Execute the sync command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let github = github_client(config, !self.dry_run)?;

        let prs = github.list_pull_requests(&config.github.state).await?;
        info!(
            "Fetched {} PRs from {}/{}",
            prs.len(),
            config.owner(),
            config.repo()
        );
        info!(
            "Mode: {}, Track by: {}",
            config.sync.mode, config.sync.track_by
        );

        if self.dry_run {
            let sheet = MemoryWorksheet::new(config.target_sheet_name());
            let written = sync_to(&github, &sheet, &prs, config).await?;
            println!("{}", sheet.to_tsv());
            println!();
            println!("Dry run: {} rows not written", written);
            return Ok(());
        }

        let id = config.spreadsheet_id();
        info!("Connecting to Google Sheets ID: {}...", short_id(id));

        let sheets = SheetsClient::from_source(&ServiceAccountSource::from_env(
            &config.sheets.service_account_file,
        ))?;
        let sheet = sheets
            .open_worksheet(id, config.target_sheet_name())
            .await
            .context("Failed to connect to Google Sheets")?;
        info!("Connected successfully");

        let written = sync_to(&github, &sheet, &prs, config).await?;

        match config.sync.mode {
            Mode::Rows => println!(
                "Appended {} rows to Google Sheet '{}'",
                written,
                sheet.title()
            ),
            Mode::Tracker => println!(
                "Updated tracker sheet '{}' with {} accounts",
                sheet.title(),
                written
            ),
        }

        Ok(())
    }
}

async fn sync_to<S, W>(
    source: &S,
    sheet: &W,
    prs: &[PullRequest],
    config: &Config,
) -> anyhow::Result<usize>
where
    S: PullRequestSource + ?Sized,
    W: Worksheet + ?Sized,
{
    match config.sync.mode {
        Mode::Rows => sync_rows(source, sheet, prs).await,
        Mode::Tracker => sync_tracker(source, sheet, prs, config.sync.track_by).await,
    }
}

/// Append one summary row per pull request
///
/// Returns the number of rows appended.
pub async fn sync_rows<S, W>(source: &S, sheet: &W, prs: &[PullRequest]) -> anyhow::Result<usize>
where
    S: PullRequestSource + ?Sized,
    W: Worksheet + ?Sized,
{
    ensure_headers(sheet, &ROW_HEADERS).await?;

    let mut rows = Vec::with_capacity(prs.len());
    for pr in prs {
        let summary = summarize_pr(source, pr)
            .await
            .with_context(|| format!("Failed to summarize PR #{}", pr.number))?;
        rows.push(summary.to_row());
    }

    sheet.append_rows(&rows).await?;
    Ok(rows.len())
}

/// Replace the worksheet contents with fresh review request counts
///
/// Returns the number of accounts written.
pub async fn sync_tracker<S, W>(
    source: &S,
    sheet: &W,
    prs: &[PullRequest],
    track_by: TrackBy,
) -> anyhow::Result<usize>
where
    S: PullRequestSource + ?Sized,
    W: Worksheet + ?Sized,
{
    ensure_headers(sheet, &TRACKER_HEADERS).await?;

    info!("Computing tracker counts...");
    let counts = compute_tracker_counts(source, prs, track_by).await?;
    info!("Found {} accounts with review requests", counts.len());

    sheet.clear().await?;
    ensure_headers(sheet, &TRACKER_HEADERS).await?;

    let rows = counts.to_rows();
    sheet.append_rows(&rows).await?;
    Ok(rows.len())
}
