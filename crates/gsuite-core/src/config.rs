//! Configuration management for gsuite-mcp

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "GSUITE_MCP_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Gmail API settings
    #[serde(default)]
    pub gmail: GmailConfig,

    /// OAuth client settings
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Token storage settings
    #[serde(default)]
    pub tokens: TokensConfig,

    /// Accounts this server acts for
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (logs, saved attachments)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

/// Gmail REST API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    /// Base URL of the per-user Gmail API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// HTTP request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Result count when a tool call does not name one
    #[serde(default = "default_max_results")]
    pub default_max_results: u32,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
            default_max_results: default_max_results(),
        }
    }
}

/// OAuth client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Google client secrets JSON ("installed" or "web" application)
    #[serde(default = "default_client_secrets_file")]
    pub client_secrets_file: PathBuf,

    /// Port of the loopback redirect used during authorization
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_secrets_file: default_client_secrets_file(),
            redirect_port: default_redirect_port(),
        }
    }
}

/// Token storage settings
///
/// Tokens are stored as `{dir}/.oauth2.{email}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    #[serde(default = "default_tokens_dir")]
    pub dir: PathBuf,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            dir: default_tokens_dir(),
        }
    }
}

/// A Google account the server may act for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    pub email: String,

    /// Free-form account kind, e.g. "personal" or "work"
    #[serde(default = "default_account_type")]
    pub account_type: String,

    /// Extra description shown to tool callers
    #[serde(default)]
    pub extra_info: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    get_data_dir()
}

fn default_api_base_url() -> String {
    "https://gmail.googleapis.com/gmail/v1/users/me".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_results() -> u32 {
    100
}

fn default_client_secrets_file() -> PathBuf {
    get_config_dir().join("client_secret.json")
}

fn default_redirect_port() -> u16 {
    4100
}

fn default_tokens_dir() -> PathBuf {
    get_config_dir().join("tokens")
}

fn default_account_type() -> String {
    "personal".to_string()
}

/// Get the data directory (XDG: ~/.local/share/gsuite-mcp)
fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join(crate::APP_NAME)
}

/// Get the config directory (XDG: ~/.config/gsuite-mcp)
fn get_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(crate::APP_NAME)
}

impl Config {
    /// Path of the config file, honoring `GSUITE_MCP_CONFIG`
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| get_config_dir().join("config.toml"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)?;
            info!("Loaded configuration from {:?}", path);
            config
        } else {
            info!("No config file found at {:?}, using defaults", path);
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents =
            toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.gmail.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig {
                field: "gmail.request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.gmail.default_max_results == 0 {
            return Err(Error::InvalidConfig {
                field: "gmail.default_max_results".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(account) = self.accounts.iter().find(|a| !a.email.contains('@')) {
            return Err(Error::InvalidConfig {
                field: "accounts.email".to_string(),
                reason: format!("{:?} is not an email address", account.email),
            });
        }
        Ok(())
    }

    /// Get the log directory
    pub fn log_dir(&self) -> PathBuf {
        self.general.data_dir.join("logs")
    }

    /// Get the attachments directory
    pub fn attachments_dir(&self) -> PathBuf {
        self.general.data_dir.join("attachments")
    }

    /// Look up a configured account by email (case-insensitive)
    pub fn account(&self, email: &str) -> Option<&AccountConfig> {
        self.accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
    }

    /// Comma-separated list of configured account emails
    pub fn account_list(&self) -> String {
        self.accounts
            .iter()
            .map(|a| a.email.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.gmail.request_timeout_secs, 30);
        assert_eq!(config.gmail.default_max_results, 100);
        assert!(config.gmail.api_base_url.starts_with("https://gmail.googleapis.com"));
        assert!(config.accounts.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[general]
log_level = "debug"

[gmail]
api_base_url = "http://127.0.0.1:9000/gmail/v1/users/me"

[[accounts]]
email = "ann@example.com"
account_type = "work"
extra_info = "Shared support inbox"

[[accounts]]
email = "bob@example.com"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.gmail.request_timeout_secs, 30);
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[0].account_type, "work");
        assert_eq!(config.accounts[1].account_type, "personal");
        assert_eq!(config.account_list(), "ann@example.com, bob@example.com");
        assert!(config.account("ANN@example.com").is_some());
        assert!(config.account("carol@example.com").is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.oauth.redirect_port, 4100);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gmail]\nrequest_timeout_secs = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(Error::InvalidConfig { .. })
        ));

        std::fs::write(&path, "[[accounts]]\nemail = \"nobody\"\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(Error::InvalidConfig { .. })
        ));

        std::fs::write(&path, "[general\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.accounts.push(AccountConfig {
            email: "ann@example.com".to_string(),
            account_type: "work".to_string(),
            extra_info: String::new(),
        });
        config.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.accounts, config.accounts);
    }
}
