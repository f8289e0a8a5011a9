//! Configuration management for jellyreaper
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! Precedence (lowest to highest): built-in defaults, YAML file,
//! `JELLYREAPER_*` environment variables, command-line flags. The layered
//! [`Config`] is then validated once into an immutable [`Settings`] that is
//! passed by reference to every stage of a run.

use crate::cli::Cli;
use crate::error::{Result, ReaperError};
use chrono::TimeDelta;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Config file read when `--config` is not given; absence is not an error
pub const DEFAULT_CONFIG_PATH: &str = "jellyreaper.yaml";

/// Upper bound on the inactivity timeout (one year, in minutes)
pub const MAX_TIMEOUT_MINUTES: i64 = 525_600;

/// Upper bound on the `--interval` loop period (one year, in minutes)
pub const MAX_INTERVAL_MINUTES: u64 = 525_600;

/// Upper bound on concurrent stop requests
pub const MAX_CONCURRENT_TERMINATIONS: usize = 64;

/// Media server API key
///
/// The key is never printed: `Debug` is redacted and there is no `Display`.
/// Use [`ApiKey::expose`] only when building the auth header.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key for the `X-MediaBrowser-Token` header
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the key is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Policy for sessions whose idle time cannot be determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MissingActivityPolicy {
    /// Treat the session as maximally idle and stop it
    #[default]
    Terminate,
    /// Never stop a session without a timestamp
    Keep,
}

impl fmt::Display for MissingActivityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingActivityPolicy::Terminate => write!(f, "terminate"),
            MissingActivityPolicy::Keep => write!(f, "keep"),
        }
    }
}

/// Main configuration structure for jellyreaper
///
/// Every field may be absent in any single layer; [`Config::validate`]
/// enforces the required ones after all layers are merged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Media server connection settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Idle evaluation and termination behaviour
    #[serde(default)]
    pub reaper: ReaperConfig,
    /// On-screen message sent after a session was stopped
    #[serde(default)]
    pub notify: NotifyConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Media server connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://jellyfin:8096`
    #[serde(default)]
    pub url: Option<String>,

    /// API key sent as `X-MediaBrowser-Token`
    #[serde(default)]
    pub api_key: Option<ApiKey>,

    /// Bound on every HTTP call (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Reaper behaviour configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReaperConfig {
    /// Inactivity timeout in minutes
    #[serde(default)]
    pub timeout_minutes: Option<i64>,

    /// Evaluate sessions that have nothing playing
    #[serde(default)]
    pub include_stopped: bool,

    /// Policy for sessions without any activity timestamp
    #[serde(default)]
    pub missing_activity: MissingActivityPolicy,

    /// Maximum stop requests in flight
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_terminations: usize,

    /// Report only, never stop sessions
    #[serde(default)]
    pub dry_run: bool,

    /// Repeat the run every N minutes instead of exiting
    #[serde(default)]
    pub interval_minutes: Option<u64>,
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: None,
            include_stopped: false,
            missing_activity: MissingActivityPolicy::default(),
            max_concurrent_terminations: default_max_concurrent(),
            dry_run: false,
            interval_minutes: None,
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Send the message after a confirmed stop
    #[serde(default = "default_notify_enabled")]
    pub enabled: bool,

    /// Message header
    #[serde(default = "default_notify_header")]
    pub header: String,

    /// Message body
    #[serde(default = "default_notify_text")]
    pub text: String,

    /// How long clients display the message (milliseconds)
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_notify_enabled() -> bool {
    true
}

fn default_notify_header() -> String {
    "Session Terminated".to_string()
}

fn default_notify_text() -> String {
    "Your session was terminated due to inactivity".to_string()
}

fn default_notify_timeout_ms() -> u64 {
    5000
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_notify_enabled(),
            header: default_notify_header(),
            text: default_notify_text(),
            timeout_ms: default_notify_timeout_ms(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `jellyreaper=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Optional log file, opened in append mode
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

/// Validated, immutable settings for one run
#[derive(Debug, Clone)]
pub struct Settings {
    /// Parsed media server base URL
    pub server_url: Url,
    /// API key, redacted in all output
    pub api_key: ApiKey,
    /// Sessions idle at least this long are stopped
    pub idle_timeout: TimeDelta,
    /// Bound on every HTTP call
    pub request_timeout: Duration,
    /// Maximum stop requests in flight
    pub max_concurrent_terminations: usize,
    /// Evaluate sessions that have nothing playing
    pub include_stopped: bool,
    /// Policy for sessions without any activity timestamp
    pub missing_activity: MissingActivityPolicy,
    /// Report only, never stop sessions
    pub dry_run: bool,
    /// Message sent to users whose session was stopped, if enabled
    pub notification: Option<Notification>,
    /// Loop period; `None` runs once and exits
    pub run_interval: Option<Duration>,
}

/// On-screen message shown to a user whose session is being stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Notification {
    /// Message header
    pub header: String,
    /// Message body
    pub text: String,
    /// Display duration in milliseconds
    pub timeout_ms: u64,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// Reads `cli.config` if given (it must exist), otherwise
    /// [`DEFAULT_CONFIG_PATH`] if it exists, otherwise starts from defaults.
    ///
    /// # Errors
    ///
    /// Returns `ReaperError::Config` if an explicitly named file is missing,
    /// if the file cannot be read or parsed, or if a `JELLYREAPER_*`
    /// variable holds a value of the wrong type
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match cli.config.as_deref() {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(ReaperError::Config(format!(
                        "Config file not found: {}",
                        path
                    ))
                    .into());
                }
                Self::from_file(path)?
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => Self::default(),
        };

        config.apply_env_vars()?;
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ReaperError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&contents)
    }

    /// Parse a YAML document into a configuration layer
    ///
    /// # Errors
    ///
    /// Returns `ReaperError::Config` if the document does not match the schema
    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents)
            .map_err(|e| ReaperError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply `JELLYREAPER_*` overrides from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// Returns `ReaperError::Config` if a numeric or boolean variable does
    /// not parse; a mistyped value never falls back to the file or default
    fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("JELLYREAPER_SERVER") {
            self.server.url = Some(url);
        }

        if let Some(key) = lookup("JELLYREAPER_API_KEY") {
            self.server.api_key = Some(ApiKey::new(key));
        }

        if let Some(timeout) = lookup("JELLYREAPER_TIMEOUT") {
            self.reaper.timeout_minutes =
                Some(parse_env_number("JELLYREAPER_TIMEOUT", &timeout)?);
        }

        if let Some(timeout) = lookup("JELLYREAPER_REQUEST_TIMEOUT") {
            self.server.request_timeout_seconds =
                parse_env_number("JELLYREAPER_REQUEST_TIMEOUT", &timeout)?;
        }

        if let Some(max) = lookup("JELLYREAPER_MAX_CONCURRENT") {
            self.reaper.max_concurrent_terminations =
                parse_env_number("JELLYREAPER_MAX_CONCURRENT", &max)?;
        }

        if let Some(dry_run) = lookup("JELLYREAPER_DRY_RUN") {
            self.reaper.dry_run = parse_env_bool("JELLYREAPER_DRY_RUN", &dry_run)?;
        }

        if let Some(level) = lookup("JELLYREAPER_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(json) = lookup("JELLYREAPER_JSON_LOGS") {
            self.logging.json_format = parse_env_bool("JELLYREAPER_JSON_LOGS", &json)?;
        }

        Ok(())
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(url) = &cli.server {
            self.server.url = Some(url.clone());
        }
        if let Some(key) = &cli.api_key {
            self.server.api_key = Some(ApiKey::new(key.clone()));
        }
        if let Some(timeout) = cli.timeout {
            self.reaper.timeout_minutes = Some(timeout);
        }
        if let Some(seconds) = cli.request_timeout {
            self.server.request_timeout_seconds = seconds;
        }
        if let Some(max) = cli.max_concurrent {
            self.reaper.max_concurrent_terminations = max;
        }
        if let Some(minutes) = cli.interval {
            self.reaper.interval_minutes = Some(minutes);
        }
        if let Some(policy) = cli.missing_activity {
            self.reaper.missing_activity = policy;
        }
        if cli.include_stopped {
            self.reaper.include_stopped = true;
        }
        if cli.dry_run {
            self.reaper.dry_run = true;
        }
        if cli.no_notify {
            self.notify.enabled = false;
        }
        if cli.verbose {
            self.logging.level = "info".to_string();
        }
        if cli.debug {
            self.logging.level = "debug".to_string();
        }
        if cli.json_logs {
            self.logging.json_format = true;
        }
        if let Some(path) = &cli.log_file {
            self.logging.file_path = Some(path.clone());
        }
    }

    /// Validate the configuration into immutable run settings
    ///
    /// # Errors
    ///
    /// Returns `ReaperError::Config` if the server URL, API key, or timeout
    /// is missing or malformed, or if any limit (including the loop
    /// interval) is out of range
    pub fn validate(&self) -> Result<Settings> {
        let server_url = parse_server_url(self.server.url.as_deref())?;

        let api_key = match &self.server.api_key {
            Some(key) if !key.is_blank() => key.clone(),
            _ => {
                return Err(ReaperError::Config(
                    "API key is required (--api-key or JELLYREAPER_API_KEY)".to_string(),
                )
                .into())
            }
        };

        let minutes = self.reaper.timeout_minutes.ok_or_else(|| {
            ReaperError::Config("timeout is required (--timeout or JELLYREAPER_TIMEOUT)".to_string())
        })?;
        if minutes <= 0 {
            return Err(ReaperError::Config(format!(
                "timeout must be a positive number of minutes, got {}",
                minutes
            ))
            .into());
        }
        if minutes > MAX_TIMEOUT_MINUTES {
            return Err(ReaperError::Config(format!(
                "timeout must be at most {} minutes, got {}",
                MAX_TIMEOUT_MINUTES, minutes
            ))
            .into());
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(ReaperError::Config(
                "request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        let max_concurrent = self.reaper.max_concurrent_terminations;
        if max_concurrent == 0 || max_concurrent > MAX_CONCURRENT_TERMINATIONS {
            return Err(ReaperError::Config(format!(
                "max_concurrent_terminations must be between 1 and {}",
                MAX_CONCURRENT_TERMINATIONS
            ))
            .into());
        }

        let run_interval = match self.reaper.interval_minutes {
            None => None,
            Some(minutes) if minutes == 0 || minutes > MAX_INTERVAL_MINUTES => {
                return Err(ReaperError::Config(format!(
                    "interval must be between 1 and {} minutes, got {}",
                    MAX_INTERVAL_MINUTES, minutes
                ))
                .into())
            }
            Some(minutes) => Some(Duration::from_secs(minutes * 60)),
        };

        let notification = self.notify.enabled.then(|| Notification {
            header: self.notify.header.clone(),
            text: self.notify.text.clone(),
            timeout_ms: self.notify.timeout_ms,
        });

        Ok(Settings {
            server_url,
            api_key,
            idle_timeout: TimeDelta::minutes(minutes),
            request_timeout: Duration::from_secs(self.server.request_timeout_seconds),
            max_concurrent_terminations: max_concurrent,
            include_stopped: self.reaper.include_stopped,
            missing_activity: self.reaper.missing_activity,
            dry_run: self.reaper.dry_run,
            notification,
            run_interval,
        })
    }
}

fn parse_server_url(raw: Option<&str>) -> Result<Url> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(ReaperError::Config(
            "server URL is required (--server or JELLYREAPER_SERVER)".to_string(),
        )
        .into());
    }

    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| ReaperError::Config(format!("Invalid server URL '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ReaperError::Config(format!(
            "Server URL must use http or https, got '{}'",
            url.scheme()
        ))
        .into());
    }
    if url.host_str().is_none() {
        return Err(ReaperError::Config(format!("Server URL has no host: {}", raw)).into());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ReaperError::Config(
            "Server URL must not contain a query string or fragment".to_string(),
        )
        .into());
    }

    Ok(url)
}

fn parse_env_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        ReaperError::Config(format!("{} must be a whole number, got '{}'", name, raw)).into()
    })
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    parse_bool(raw).ok_or_else(|| {
        ReaperError::Config(format!(
            "{} must be one of true/false, yes/no, on/off, 1/0, got '{}'",
            name, raw
        ))
        .into()
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
