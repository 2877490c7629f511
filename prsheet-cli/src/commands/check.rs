//! Check command - verify credentials and access without writing

use anyhow::Context;
use chrono::DateTime;
use clap::Args;
use prsheet_core::{Config, ServiceAccountSource};
use prsheet_sheets::SheetsClient;
use tracing::{info, warn};

use super::{github_client, short_id};

/// Verify GitHub and Google Sheets access
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Only check GitHub
    #[arg(long)]
    skip_sheets: bool,
}

impl CheckArgs {
    /// Execute the check command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let github = github_client(config, !self.skip_sheets)?;

        println!("GitHub:");
        github
            .test_connection()
            .await
            .with_context(|| format!("Cannot access {}/{}", config.owner(), config.repo()))?;
        println!("  repository: {}/{} (ok)", config.owner(), config.repo());

        match github.quota().await {
            Ok(quota) => {
                let reset = DateTime::from_timestamp(quota.reset as i64, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| quota.reset.to_string());
                println!(
                    "  rate limit: {}/{} remaining, resets {}",
                    quota.remaining, quota.limit, reset
                );
            }
            Err(e) => warn!(error = %e, "Could not read rate limit"),
        }

        if self.skip_sheets {
            return Ok(());
        }

        println!();
        println!("Google Sheets:");

        let id = config.spreadsheet_id();
        info!("Connecting to Google Sheets ID: {}...", short_id(id));

        let sheets = SheetsClient::from_source(&ServiceAccountSource::from_env(
            &config.sheets.service_account_file,
        ))?;
        let title = config.target_sheet_name();
        let exists = sheets
            .has_worksheet(id, title)
            .await
            .context("Failed to connect to Google Sheets")?;

        println!("  spreadsheet: {}... (ok)", short_id(id));
        if exists {
            println!("  worksheet '{}': found", title);
        } else {
            println!("  worksheet '{}': missing, sync will create it", title);
        }

        Ok(())
    }
}
