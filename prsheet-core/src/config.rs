//! Configuration management for prsheet
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (GH_OWNER, GOOGLE_SHEETS_ID, MODE, ...)
//! 3. Config file (~/.config/prsheet/config.toml)
//! 4. Default values

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default GitHub REST endpoint
pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Worksheet used by rows mode when none is configured
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
/// Worksheet used by tracker mode when none is configured
pub const DEFAULT_TRACKER_SHEET_NAME: &str = "Tracker";
/// Service account key file looked up when none is configured
pub const DEFAULT_SERVICE_ACCOUNT_FILE: &str = "service_account.json";

/// What a sync run writes to the spreadsheet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Append one row per pull request
    #[default]
    Rows,
    /// Rewrite a per-account review request counter
    Tracker,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rows" => Ok(Mode::Rows),
            "tracker" => Ok(Mode::Tracker),
            _ => Err(Error::Config(
                "MODE must be either 'rows' or 'tracker'".to_string(),
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Rows => f.write_str("rows"),
            Mode::Tracker => f.write_str("tracker"),
        }
    }
}

/// Which account a review request is credited to in tracker mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackBy {
    /// The pull request author
    #[default]
    Creator,
    /// Whoever issued the first review request
    Requester,
}

impl FromStr for TrackBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "creator" => Ok(TrackBy::Creator),
            "requester" => Ok(TrackBy::Requester),
            _ => Err(Error::Config(
                "TRACK_BY must be either 'creator' or 'requester'".to_string(),
            )),
        }
    }
}

impl fmt::Display for TrackBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackBy::Creator => f.write_str("creator"),
            TrackBy::Requester => f.write_str("requester"),
        }
    }
}

/// GitHub-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Repository owner (user or organization)
    pub owner: Option<String>,

    /// Repository name
    pub repo: Option<String>,

    /// REST API base URL, override for GitHub Enterprise
    pub api_url: String,

    /// Pull request state filter: open, closed or all
    pub state: String,

    /// Page size for list endpoints
    pub per_page: u8,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            api_url: DEFAULT_API_URL.to_string(),
            state: "all".to_string(),
            per_page: 100,
        }
    }
}

/// Google Sheets configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Spreadsheet key, as found in the sheet URL
    pub spreadsheet_id: Option<String>,

    /// Path to the service account JSON key
    pub service_account_file: String,

    /// Worksheet written in rows mode
    pub sheet_name: String,

    /// Worksheet written in tracker mode
    pub tracker_sheet_name: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            service_account_file: DEFAULT_SERVICE_ACCOUNT_FILE.to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            tracker_sheet_name: DEFAULT_TRACKER_SHEET_NAME.to_string(),
        }
    }
}

/// Sync behaviour configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    pub mode: Mode,

    pub track_by: TrackBy,

    /// Consecutive rate-limit sleeps allowed for a single request
    pub rate_limit_retries: u32,

    /// Longest single rate-limit sleep
    #[serde(with = "humantime_serde")]
    pub max_rate_limit_wait: Duration,

    /// Unparseable MODE value from the environment, reported by validation
    #[serde(skip)]
    invalid_mode: Option<String>,

    /// Unparseable TRACK_BY value from the environment, reported by validation
    #[serde(skip)]
    invalid_track_by: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            track_by: TrackBy::default(),
            rate_limit_retries: 5,
            max_rate_limit_wait: Duration::from_secs(15 * 60),
            invalid_mode: None,
            invalid_track_by: None,
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: Option<String>,
    pub tracker_sheet_name: Option<String>,
    pub mode: Option<Mode>,
    pub track_by: Option<TrackBy>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub sheets: SheetsConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/prsheet/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("prsheet").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - GH_OWNER, GH_REPO, GH_API_URL
    /// - GOOGLE_SHEETS_ID, GOOGLE_SERVICE_ACCOUNT_FILE
    /// - SHEET_NAME, TRACKER_SHEET_NAME
    /// - MODE (rows | tracker), TRACK_BY (creator | requester)
    ///
    /// An invalid MODE or TRACK_BY is held back and reported by
    /// [`Config::validate`], unless a CLI flag replaces it first.
    pub fn with_env_overrides(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    ///
    /// Blank values are treated as unset.
    pub fn with_vars<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(owner) = var("GH_OWNER") {
            self.github.owner = Some(owner);
        }
        if let Some(repo) = var("GH_REPO") {
            self.github.repo = Some(repo);
        }
        if let Some(api_url) = var("GH_API_URL") {
            self.github.api_url = api_url;
        }
        if let Some(id) = var("GOOGLE_SHEETS_ID") {
            self.sheets.spreadsheet_id = Some(id);
        }
        if let Some(file) = var("GOOGLE_SERVICE_ACCOUNT_FILE") {
            self.sheets.service_account_file = file;
        }
        if let Some(name) = var("SHEET_NAME") {
            self.sheets.sheet_name = name;
        }
        if let Some(name) = var("TRACKER_SHEET_NAME") {
            self.sheets.tracker_sheet_name = name;
        }
        if let Some(mode) = var("MODE") {
            match mode.parse() {
                Ok(mode) => {
                    self.sync.mode = mode;
                    self.sync.invalid_mode = None;
                }
                Err(_) => self.sync.invalid_mode = Some(mode),
            }
        }
        if let Some(track_by) = var("TRACK_BY") {
            match track_by.parse() {
                Ok(track_by) => {
                    self.sync.track_by = track_by;
                    self.sync.invalid_track_by = None;
                }
                Err(_) => self.sync.invalid_track_by = Some(track_by),
            }
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(owner) = overrides.owner {
            self.github.owner = Some(owner);
        }
        if let Some(repo) = overrides.repo {
            self.github.repo = Some(repo);
        }
        if let Some(id) = overrides.spreadsheet_id {
            self.sheets.spreadsheet_id = Some(id);
        }
        if let Some(name) = overrides.sheet_name {
            self.sheets.sheet_name = name;
        }
        if let Some(name) = overrides.tracker_sheet_name {
            self.sheets.tracker_sheet_name = name;
        }
        if let Some(mode) = overrides.mode {
            self.sync.mode = mode;
            self.sync.invalid_mode = None;
        }
        if let Some(track_by) = overrides.track_by {
            self.sync.track_by = track_by;
            self.sync.invalid_track_by = None;
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(path: Option<&Path>, overrides: CliOverrides) -> Result<Self> {
        let base = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::load()?,
        };

        Ok(base.with_env_overrides().with_cli_overrides(overrides))
    }

    /// Check that everything a sync run needs is present
    ///
    /// All missing settings are reported together, before any invalid
    /// MODE or TRACK_BY value.
    pub fn validate(&self, has_token: bool) -> Result<()> {
        self.check_required(has_token, true)
    }

    /// Like [`Config::validate`], but without the Google Sheets settings
    ///
    /// Used for dry runs, which never contact Google.
    pub fn validate_github(&self, has_token: bool) -> Result<()> {
        self.check_required(has_token, false)
    }

    fn check_required(&self, has_token: bool, with_sheets: bool) -> Result<()> {
        let mut missing = Vec::new();

        if is_blank(&self.github.owner) {
            missing.push("GH_OWNER".to_string());
        }
        if is_blank(&self.github.repo) {
            missing.push("GH_REPO".to_string());
        }
        if with_sheets && is_blank(&self.sheets.spreadsheet_id) {
            missing.push("GOOGLE_SHEETS_ID".to_string());
        }
        if with_sheets && self.sheets.service_account_file.trim().is_empty() {
            missing.push("GOOGLE_SERVICE_ACCOUNT_FILE".to_string());
        }
        if !has_token {
            missing.push("GH_TOKEN (or GH_TOKEN_FILE or gh auth login)".to_string());
        }

        if !missing.is_empty() {
            return Err(Error::MissingConfig(missing));
        }

        if let Some(mode) = &self.sync.invalid_mode {
            mode.parse::<Mode>()?;
        }
        if let Some(track_by) = &self.sync.invalid_track_by {
            track_by.parse::<TrackBy>()?;
        }

        Ok(())
    }

    /// Repository owner, empty when unset
    pub fn owner(&self) -> &str {
        self.github.owner.as_deref().unwrap_or_default()
    }

    /// Repository name, empty when unset
    pub fn repo(&self) -> &str {
        self.github.repo.as_deref().unwrap_or_default()
    }

    /// Spreadsheet key, empty when unset
    pub fn spreadsheet_id(&self) -> &str {
        self.sheets.spreadsheet_id.as_deref().unwrap_or_default()
    }

    /// Worksheet the configured mode writes to
    pub fn target_sheet_name(&self) -> &str {
        match self.sync.mode {
            Mode::Rows => &self.sheets.sheet_name,
            Mode::Tracker => &self.sheets.tracker_sheet_name,
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.state, "all");
        assert_eq!(config.github.per_page, 100);
        assert_eq!(config.sheets.sheet_name, "Sheet1");
        assert_eq!(config.sheets.tracker_sheet_name, "Tracker");
        assert_eq!(config.sheets.service_account_file, "service_account.json");
        assert_eq!(config.sync.mode, Mode::Rows);
        assert_eq!(config.sync.track_by, TrackBy::Creator);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(" Tracker ".parse::<Mode>().unwrap(), Mode::Tracker);
        assert_eq!("ROWS".parse::<Mode>().unwrap(), Mode::Rows);
        let err = "both".parse::<Mode>().unwrap_err();
        assert_eq!(err.to_string(), "MODE must be either 'rows' or 'tracker'");
    }

    #[test]
    fn test_track_by_parsing() {
        assert_eq!("requester".parse::<TrackBy>().unwrap(), TrackBy::Requester);
        let err = "reviewer".parse::<TrackBy>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "TRACK_BY must be either 'creator' or 'requester'"
        );
    }

    #[test]
    fn test_env_overrides() {
        let env = vars(&[
            ("GH_OWNER", "acme"),
            ("GH_REPO", " widgets "),
            ("GOOGLE_SHEETS_ID", "sheet-key"),
            ("SHEET_NAME", ""),
            ("MODE", "tracker"),
            ("TRACK_BY", "Requester"),
        ]);
        let config = Config::default().with_vars(|k| env.get(k).cloned());

        assert_eq!(config.owner(), "acme");
        assert_eq!(config.repo(), "widgets");
        assert_eq!(config.spreadsheet_id(), "sheet-key");
        // blank values keep the default
        assert_eq!(config.sheets.sheet_name, "Sheet1");
        assert_eq!(config.sync.mode, Mode::Tracker);
        assert_eq!(config.sync.track_by, TrackBy::Requester);
        assert_eq!(config.target_sheet_name(), "Tracker");
    }

    fn complete_env(extra: &[(&str, &str)]) -> HashMap<String, String> {
        let mut env = vars(&[
            ("GH_OWNER", "acme"),
            ("GH_REPO", "widgets"),
            ("GOOGLE_SHEETS_ID", "key"),
        ]);
        env.extend(vars(extra));
        env
    }

    #[test]
    fn test_env_invalid_mode() {
        let env = complete_env(&[("MODE", "columns")]);
        let config = Config::default().with_vars(|k| env.get(k).cloned());

        let err = config.validate(true).unwrap_err();
        assert_eq!(err.to_string(), "MODE must be either 'rows' or 'tracker'");
    }

    #[test]
    fn test_env_invalid_track_by() {
        let env = complete_env(&[("TRACK_BY", "reviewer")]);
        let config = Config::default().with_vars(|k| env.get(k).cloned());

        let err = config.validate_github(true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TRACK_BY must be either 'creator' or 'requester'"
        );
    }

    #[test]
    fn test_missing_config_reported_before_invalid_mode() {
        let env = vars(&[("MODE", "bogus")]);
        let config = Config::default().with_vars(|k| env.get(k).cloned());

        let err = config.validate(false).unwrap_err();
        assert!(matches!(err, Error::MissingConfig(_)));
        assert!(err.to_string().starts_with("Missing configuration: GH_OWNER, GH_REPO"));
    }

    #[test]
    fn test_cli_mode_replaces_invalid_env_mode() {
        let env = complete_env(&[("MODE", "bogus")]);
        let config = Config::default()
            .with_vars(|k| env.get(k).cloned())
            .with_cli_overrides(CliOverrides {
                mode: Some(Mode::Rows),
                ..Default::default()
            });

        assert_eq!(config.sync.mode, Mode::Rows);
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_cli_overrides_win_over_env() {
        let env = vars(&[("GH_OWNER", "from-env"), ("MODE", "rows")]);
        let config = Config::default()
            .with_vars(|k| env.get(k).cloned())
            .with_cli_overrides(CliOverrides {
                owner: Some("from-cli".to_string()),
                mode: Some(Mode::Tracker),
                ..Default::default()
            });

        assert_eq!(config.owner(), "from-cli");
        assert_eq!(config.sync.mode, Mode::Tracker);
    }

    #[test]
    fn test_validate_reports_all_missing() {
        let err = Config::default().validate(false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing configuration: GH_OWNER, GH_REPO, GOOGLE_SHEETS_ID, \
             GH_TOKEN (or GH_TOKEN_FILE or gh auth login)"
        );
    }

    #[test]
    fn test_validate_complete() {
        let config = Config::default().with_cli_overrides(CliOverrides {
            owner: Some("acme".to_string()),
            repo: Some("widgets".to_string()),
            spreadsheet_id: Some("key".to_string()),
            ..Default::default()
        });
        assert!(config.validate(true).is_ok());
        assert!(config.validate(false).is_err());
    }

    #[test]
    fn test_validate_github_ignores_sheets() {
        let config = Config::default().with_cli_overrides(CliOverrides {
            owner: Some("acme".to_string()),
            repo: Some("widgets".to_string()),
            ..Default::default()
        });
        assert!(config.validate_github(true).is_ok());
        assert!(config.validate(true).is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[github]
owner = "acme"
repo = "widgets"

[sheets]
spreadsheet_id = "abc123"
tracker_sheet_name = "Reviews"

[sync]
mode = "tracker"
track_by = "requester"
max_rate_limit_wait = "2m"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.owner(), "acme");
        assert_eq!(config.sheets.tracker_sheet_name, "Reviews");
        // unspecified fields use defaults
        assert_eq!(config.sheets.sheet_name, "Sheet1");
        assert_eq!(config.sync.mode, Mode::Tracker);
        assert_eq!(config.sync.max_rate_limit_wait, Duration::from_secs(120));
        assert_eq!(config.sync.rate_limit_retries, 5);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[github]\nowner = \"acme\"\nstate = \"closed\"").unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.owner(), "acme");
        assert_eq!(config.github.state, "closed");
    }

    #[test]
    fn test_load_from_file_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[sync]\nmode = \"sideways\"").unwrap();

        let err = Config::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }
}
