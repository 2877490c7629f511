//! prsheet CLI - sync GitHub pull requests into Google Sheets
//!
//! Exports one row per pull request, or a per-account count of review
//! requests, into a worksheet.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use prsheet_core::{CliOverrides, Config, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{CheckArgs, SyncArgs};

/// prsheet: sync GitHub pull requests into Google Sheets
#[derive(Parser, Debug)]
#[command(name = "prsheet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/prsheet/config.toml)
    #[arg(long, global = true, env = "PRSHEET_CONFIG")]
    config: Option<PathBuf>,

    /// Repository as owner/repo or a GitHub URL (overrides GH_OWNER/GH_REPO)
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Spreadsheet key (overrides GOOGLE_SHEETS_ID)
    #[arg(long, global = true)]
    sheet_id: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync pull requests into the spreadsheet (default)
    Sync(SyncArgs),

    /// Verify credentials and access without writing anything
    Check(CheckArgs),

    /// Show effective configuration
    Config,

    /// Show version information
    Version,
}

impl Cli {
    fn overrides(&self) -> anyhow::Result<CliOverrides> {
        let mut overrides = CliOverrides {
            spreadsheet_id: self.sheet_id.clone(),
            ..Default::default()
        };

        if let Some(repo) = &self.repo {
            let (owner, name) = prsheet_github::parse_github_url(repo)?;
            overrides.owner = Some(owner);
            overrides.repo = Some(name);
        }

        if let Some(Commands::Sync(args)) = &self.command {
            args.apply(&mut overrides);
        }

        Ok(overrides)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Commands::Version) = cli.command {
        println!("prsheet {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let overrides = cli.overrides()?;
    let config = Config::load_with_overrides(cli.config.as_deref(), overrides)?;

    tracing::debug!(
        owner = config.owner(),
        repo = config.repo(),
        mode = %config.sync.mode,
        "Configuration loaded"
    );

    match cli.command {
        Some(Commands::Sync(args)) => args.execute(&config).await,
        None => SyncArgs::default().execute(&config).await,
        Some(Commands::Check(args)) => args.execute(&config).await,
        Some(Commands::Config) => show_config(&config, cli.config.as_deref()),
        Some(Commands::Version) => Ok(()),
    }
}

fn show_config(config: &Config, path: Option<&std::path::Path>) -> anyhow::Result<()> {
    let display = |v: &str| if v.is_empty() { "(unset)".to_string() } else { v.to_string() };

    println!("prsheet Configuration");
    println!("=====================");
    println!();
    println!("GitHub:");
    println!("  owner: {}", display(config.owner()));
    println!("  repo: {}", display(config.repo()));
    println!("  api_url: {}", config.github.api_url);
    println!("  state: {}", config.github.state);
    let token = Secrets::github_token()?;
    println!(
        "  token: {}",
        if token.is_some() { "(found)" } else { "(missing)" }
    );
    println!();
    println!("Google Sheets:");
    println!("  spreadsheet_id: {}", display(config.spreadsheet_id()));
    println!("  service_account_file: {}", config.sheets.service_account_file);
    println!("  sheet_name: {}", config.sheets.sheet_name);
    println!("  tracker_sheet_name: {}", config.sheets.tracker_sheet_name);
    println!();
    println!("Sync:");
    println!("  mode: {}", config.sync.mode);
    println!("  track_by: {}", config.sync.track_by);
    println!("  rate_limit_retries: {}", config.sync.rate_limit_retries);
    println!(
        "  max_rate_limit_wait: {}s",
        config.sync.max_rate_limit_wait.as_secs()
    );
    println!();

    let path = path
        .map(std::path::Path::to_path_buf)
        .or_else(Config::default_config_path);
    if let Some(path) = path {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }

    Ok(())
}
