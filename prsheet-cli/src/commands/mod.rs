//! CLI command implementations

pub mod check;
pub mod sync;

pub use check::CheckArgs;
pub use sync::SyncArgs;

use anyhow::Context;
use prsheet_core::{Config, Secrets};
use prsheet_github::{GitHubClient, GitHubOptions};

/// Resolve the GitHub token, failing with the list of missing settings
///
/// `with_sheets` decides whether the Google settings count as required.
pub(crate) fn github_client(config: &Config, with_sheets: bool) -> anyhow::Result<GitHubClient> {
    let token = Secrets::github_token()?;

    if with_sheets {
        config.validate(token.is_some())?;
    } else {
        config.validate_github(token.is_some())?;
    }

    let token = token.context("GitHub token not found")?;
    let client = GitHubClient::with_options(
        &token,
        config.owner(),
        config.repo(),
        GitHubOptions::from_config(config),
    )?;

    Ok(client)
}

/// First characters of a spreadsheet key, for log lines
pub(crate) fn short_id(id: &str) -> String {
    id.chars().take(10).collect()
}
