//! Runtime configuration.
//!
//! Settings come from one of two sources:
//!
//! - **Environment** (`HARNESS_*` variables) via [`Config::from_env`], or any
//!   key lookup via [`Config::from_lookup`].
//! - **TOML file** via [`Config::load`] / [`Config::from_toml_str`], using the
//!   `snake_case` keys listed on [`Config`].
//!
//! Only the API key is mandatory. When the account id is not given it is
//! taken from the second segment of a personal access token of the form
//! `pat.<account>.<token>.<secret>`.
//!
//! ```toml
//! api_key = "pat.abc123.tok.secret"
//! base_url = "https://app.harness.io"
//! default_project_id = "my-project"
//! timeout_ms = 30000
//! toolsets = ["pipelines", "services"]
//! ```

use std::{fmt, fs, path::Path, str::FromStr, time::Duration};

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://app.harness.io";
pub const DEFAULT_ORG_ID: &str = "default";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_RATE_LIMIT_PER_SEC: u32 = 10;

/// Errors raised while assembling a [`Config`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error(
        "could not determine the account id; set HARNESS_ACCOUNT_ID or use a PAT of the form pat.<account>.<token>.<secret>"
    )]
    AccountId,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Verbosity requested for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level \"{other}\"")),
        }
    }
}

/// Fully resolved settings for the client and registry.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub account_id: String,
    /// Origin of the platform, without trailing slash.
    pub base_url: String,
    pub default_org_id: String,
    pub default_project_id: Option<String>,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each later one.
    pub base_backoff: Duration,
    /// Sustained request rate, also the burst size.
    pub rate_limit_per_sec: u32,
    /// Toolsets to enable. `None` enables all of them.
    pub toolsets: Option<Vec<String>>,
    pub log_level: LogLevel,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("account_id", &self.account_id)
            .field("base_url", &self.base_url)
            .field("default_org_id", &self.default_org_id)
            .field("default_project_id", &self.default_project_id)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("base_backoff", &self.base_backoff)
            .field("rate_limit_per_sec", &self.rate_limit_per_sec)
            .field("toolsets", &self.toolsets)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Unvalidated settings as read from a source.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    api_key: Option<String>,
    account_id: Option<String>,
    base_url: Option<String>,
    default_org_id: Option<String>,
    default_project_id: Option<String>,
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    base_backoff_ms: Option<u64>,
    rate_limit_per_sec: Option<u32>,
    toolsets: Option<Vec<String>>,
    log_level: Option<LogLevel>,
}

impl Config {
    /// Reads settings from `HARNESS_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `HARNESS_API_KEY` is missing, a numeric variable
    /// does not parse, or no account id can be determined.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary key lookup using the environment
    /// variable names.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let settings = Settings {
            api_key: get("HARNESS_API_KEY"),
            account_id: get("HARNESS_ACCOUNT_ID"),
            base_url: get("HARNESS_BASE_URL"),
            default_org_id: get("HARNESS_DEFAULT_ORG_ID"),
            default_project_id: get("HARNESS_DEFAULT_PROJECT_ID"),
            timeout_ms: parse_var("HARNESS_API_TIMEOUT_MS", get("HARNESS_API_TIMEOUT_MS"))?,
            max_retries: parse_var("HARNESS_MAX_RETRIES", get("HARNESS_MAX_RETRIES"))?,
            base_backoff_ms: parse_var("HARNESS_BASE_BACKOFF_MS", get("HARNESS_BASE_BACKOFF_MS"))?,
            rate_limit_per_sec: parse_var(
                "HARNESS_RATE_LIMIT_PER_SEC",
                get("HARNESS_RATE_LIMIT_PER_SEC"),
            )?,
            toolsets: get("HARNESS_TOOLSETS").map(|raw| split_list(&raw)),
            log_level: get("LOG_LEVEL")
                .map(|raw| raw.parse::<LogLevel>())
                .transpose()
                .map_err(|reason| ConfigError::Invalid {
                    key: "LOG_LEVEL",
                    reason,
                })?,
        };

        settings.resolve()
    }

    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML, contains unknown keys,
    /// or fails the same validation as [`Config::from_env`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(source)?;
        settings.resolve()
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its content is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

impl Settings {
    fn resolve(self) -> Result<Config, ConfigError> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("HARNESS_API_KEY"))?;

        let account_id = match self.account_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => id,
            None => extract_account_id(&api_key)
                .map(str::to_string)
                .ok_or(ConfigError::AccountId)?,
        };

        let base_url = normalize_base_url(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL))?;

        let rate_limit_per_sec = self.rate_limit_per_sec.unwrap_or(DEFAULT_RATE_LIMIT_PER_SEC);
        if rate_limit_per_sec == 0 {
            return Err(ConfigError::Invalid {
                key: "HARNESS_RATE_LIMIT_PER_SEC",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Config {
            api_key,
            account_id,
            base_url,
            default_org_id: self
                .default_org_id
                .unwrap_or_else(|| DEFAULT_ORG_ID.to_string()),
            default_project_id: self.default_project_id.filter(|id| !id.is_empty()),
            timeout: Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            base_backoff: Duration::from_millis(
                self.base_backoff_ms.unwrap_or(DEFAULT_BASE_BACKOFF_MS),
            ),
            rate_limit_per_sec,
            toolsets: self.toolsets.filter(|names| !names.is_empty()),
            log_level: self.log_level.unwrap_or_default(),
        })
    }
}

/// Extracts the account id from a personal access token.
///
/// Tokens look like `pat.<account>.<token>.<secret>`; anything else yields
/// `None`.
#[must_use]
pub fn extract_account_id(api_key: &str) -> Option<&str> {
    let mut parts = api_key.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("pat"), Some(account), Some(_), Some(_)) if !account.is_empty() => Some(account),
        _ => None,
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = reqwest::Url::parse(trimmed).map_err(|err| ConfigError::Invalid {
        key: "HARNESS_BASE_URL",
        reason: err.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            key: "HARNESS_BASE_URL",
            reason: format!("unsupported scheme \"{}\"", parsed.scheme()),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_var<T: FromStr>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T::Err: fmt::Display,
{
    raw.map(|value| {
        value.parse::<T>().map_err(|err| ConfigError::Invalid {
            key,
            reason: format!("\"{value}\": {err}"),
        })
    })
    .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
