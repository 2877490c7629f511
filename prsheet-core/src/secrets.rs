//! Secrets management for prsheet
//!
//! The GitHub token is looked up in this order:
//! 1. GH_TOKEN environment variable
//! 2. File named by GH_TOKEN_FILE
//! 3. Secrets file (~/.config/prsheet/secrets.toml)
//! 4. `gh auth token`, when the GitHub CLI is installed
//!
//! Google credentials come from GOOGLE_SERVICE_ACCOUNT_JSON when set,
//! otherwise from the configured service account file.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Secrets structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// GitHub configuration
    pub github: GitHubSecrets,
}

/// GitHub-related secrets
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubSecrets {
    /// GitHub Personal Access Token
    pub token: Option<String>,
}

impl Secrets {
    /// Load secrets from the default location
    ///
    /// Returns default (empty) secrets if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_secrets_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load secrets from a specific file with permission checking
    pub fn load_from_file(path: &Path) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path)?.permissions().mode();

            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "Secrets file {} has insecure permissions {:o}. \
                     Please run: chmod 600 {}",
                    path.display(),
                    mode & 0o777,
                    path.display()
                )));
            }
        }

        let contents = std::fs::read_to_string(path)?;
        let mut secrets: Secrets = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse secrets: {}", e)))?;

        if let Some(ref mut token) = secrets.github.token {
            *token = token.trim().to_string();
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    ///
    /// Returns `~/.config/prsheet/secrets.toml` on Unix
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("prsheet").join("secrets.toml"))
    }

    /// Resolve the GitHub token from the process environment
    ///
    /// Returns `Ok(None)` when no source yields a token. A GH_TOKEN_FILE that
    /// points at a missing file is an error rather than a fallthrough. The
    /// secrets file is only read when neither environment source is set.
    pub fn github_token() -> Result<Option<String>> {
        Self::github_token_with(
            |key| std::env::var(key).ok(),
            || Ok(Self::load()?.github.token),
            gh_cli_token,
        )
    }

    /// Resolve the GitHub token with injectable lookups
    ///
    /// `secrets_token` and `gh_cli` are only called when every earlier
    /// source came up empty.
    pub fn github_token_with<F, S, G>(lookup: F, secrets_token: S, gh_cli: G) -> Result<Option<String>>
    where
        F: Fn(&str) -> Option<String>,
        S: FnOnce() -> Result<Option<String>>,
        G: FnOnce() -> Option<String>,
    {
        if let Some(token) = non_empty(lookup("GH_TOKEN")) {
            debug!("Using GitHub token from GH_TOKEN");
            return Ok(Some(token));
        }

        if let Some(path) = non_empty(lookup("GH_TOKEN_FILE")) {
            let token = match std::fs::read_to_string(&path) {
                Ok(contents) => contents.trim().to_string(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(Error::Config(format!("GH_TOKEN_FILE not found: {}", path)));
                }
                Err(e) => return Err(Error::Io(e)),
            };
            if !token.is_empty() {
                debug!(path = %path, "Using GitHub token from GH_TOKEN_FILE");
                return Ok(Some(token));
            }
        }

        if let Some(token) = non_empty(secrets_token()?) {
            debug!("Using GitHub token from secrets file");
            return Ok(Some(token));
        }

        if let Some(token) = non_empty(gh_cli()) {
            debug!("Using GitHub token from gh CLI");
            return Ok(Some(token));
        }

        Ok(None)
    }
}

/// Ask the GitHub CLI for its stored token
///
/// Any failure (gh missing, not logged in, non-zero exit) yields `None`.
pub fn gh_cli_token() -> Option<String> {
    let gh = which::which("gh").ok()?;

    let output = Command::new(gh).args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        debug!(status = %output.status, "gh auth token failed");
        return None;
    }

    non_empty(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Where the Google service account key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAccountSource {
    /// Raw JSON key from GOOGLE_SERVICE_ACCOUNT_JSON
    Inline(String),
    /// Path to a JSON key file
    File(PathBuf),
}

impl ServiceAccountSource {
    /// Pick the credential source from the process environment
    pub fn from_env(service_account_file: &str) -> Self {
        Self::from_vars(|key| std::env::var(key).ok(), service_account_file)
    }

    /// Pick the credential source with an injectable lookup
    pub fn from_vars<F>(lookup: F, service_account_file: &str) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        match non_empty(lookup("GOOGLE_SERVICE_ACCOUNT_JSON")) {
            Some(json) => ServiceAccountSource::Inline(json),
            None => ServiceAccountSource::File(PathBuf::from(service_account_file)),
        }
    }

    /// Read the raw key JSON
    pub fn read(&self) -> Result<String> {
        match self {
            ServiceAccountSource::Inline(json) => Ok(json.clone()),
            ServiceAccountSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!(
                    "Cannot read service account file {}: {}",
                    path.display(),
                    e
                ))
            }),
        }
    }

    /// Human-readable origin for log and error messages
    pub fn describe(&self) -> String {
        match self {
            ServiceAccountSource::Inline(_) => "GOOGLE_SERVICE_ACCOUNT_JSON".to_string(),
            ServiceAccountSource::File(path) => path.display().to_string(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_secrets() {
        let toml = r#"
[github]
token = "ghp_xxxxxxxxxxxx"
"#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.github.token, Some("ghp_xxxxxxxxxxxx".to_string()));
    }

    #[test]
    fn test_env_token_wins() {
        let vars = env(&[("GH_TOKEN", "  from_env \n")]);

        let token = Secrets::github_token_with(
            |k| vars.get(k).cloned(),
            || Ok(Some("from_file".to_string())),
            || Some("from_gh".to_string()),
        )
        .unwrap();
        assert_eq!(token, Some("from_env".to_string()));
    }

    #[test]
    fn test_token_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "ghp_from_token_file").unwrap();
        let path = file.path().display().to_string();
        let vars = env(&[("GH_TOKEN", ""), ("GH_TOKEN_FILE", path.as_str())]);

        let token = Secrets::github_token_with(|k| vars.get(k).cloned(), || Ok(None), || None)
            .unwrap();
        assert_eq!(token, Some("ghp_from_token_file".to_string()));
    }

    #[test]
    fn test_missing_token_file_is_fatal() {
        let vars = env(&[("GH_TOKEN_FILE", "/nonexistent/prsheet/token")]);

        let err = Secrets::github_token_with(
            |k| vars.get(k).cloned(),
            || Ok(None),
            || Some("from_gh".to_string()),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "GH_TOKEN_FILE not found: /nonexistent/prsheet/token"
        );
    }

    #[test]
    fn test_gh_cli_fallback() {
        let token =
            Secrets::github_token_with(|_| None, || Ok(None), || Some("gho_cli\n".to_string()))
                .unwrap();
        assert_eq!(token, Some("gho_cli".to_string()));
    }

    #[test]
    fn test_no_token() {
        let token = Secrets::github_token_with(|_| None, || Ok(None), || None).unwrap();
        assert!(token.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_insecure_permissions_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[github]\ntoken = \"test\"").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        let result = Secrets::load_from_file(file.path());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("insecure permissions"));
    }

    #[cfg(unix)]
    #[test]
    fn test_env_token_skips_insecure_secrets_file() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[github]\ntoken = \"from_file\"").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        let secrets_token =
            || -> Result<Option<String>> { Ok(Secrets::load_from_file(file.path())?.github.token) };

        let vars = env(&[("GH_TOKEN", "ghp_env")]);
        let token =
            Secrets::github_token_with(|k| vars.get(k).cloned(), secrets_token, || None).unwrap();
        assert_eq!(token, Some("ghp_env".to_string()));

        let err = Secrets::github_token_with(|_| None, secrets_token, || None).unwrap_err();
        assert!(err.to_string().contains("insecure permissions"));
    }

    #[test]
    fn test_secrets_file_before_gh_cli() {
        let token = Secrets::github_token_with(
            |_| None,
            || Ok(Some(" from_file ".to_string())),
            || Some("from_gh".to_string()),
        )
        .unwrap();
        assert_eq!(token, Some("from_file".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_secure_permissions_accepted() {
        use std::os::unix::fs::PermissionsExt;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[github]\ntoken = \"  ghp_test  \"").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();

        let secrets = Secrets::load_from_file(file.path()).unwrap();
        assert_eq!(secrets.github.token, Some("ghp_test".to_string()));
    }

    #[test]
    fn test_service_account_source() {
        let vars = env(&[("GOOGLE_SERVICE_ACCOUNT_JSON", "{\"type\":\"service_account\"}")]);
        let source = ServiceAccountSource::from_vars(|k| vars.get(k).cloned(), "sa.json");
        assert_eq!(
            source,
            ServiceAccountSource::Inline("{\"type\":\"service_account\"}".to_string())
        );
        assert_eq!(source.describe(), "GOOGLE_SERVICE_ACCOUNT_JSON");

        let source = ServiceAccountSource::from_vars(|_| None, "sa.json");
        assert_eq!(source, ServiceAccountSource::File(PathBuf::from("sa.json")));
    }

    #[test]
    fn test_service_account_file_missing() {
        let source = ServiceAccountSource::File(PathBuf::from("/nonexistent/sa.json"));
        let err = source.read().unwrap_err();
        assert!(err.to_string().contains("Cannot read service account file"));
    }
}
