//! Command-line interface definition for jellyreaper
//!
//! This module defines the CLI structure using clap's derive API. Every flag
//! is optional at parse time; required values may also come from the config
//! file or the environment and are checked by [`crate::config::Config::validate`].

use crate::config::MissingActivityPolicy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// jellyreaper - stop idle media server sessions
///
/// Lists the active sessions of a Jellyfin server and stops every session
/// that has been paused (or idle) for at least the configured timeout.
/// Designed to be run from cron; `--interval` keeps it running instead.
#[derive(Parser, Debug, Clone)]
#[command(name = "jellyreaper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: jellyreaper.yaml, optional)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Media server base URL (e.g. http://jellyfin:8096)
    #[arg(long)]
    pub server: Option<String>,

    /// Media server API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// Inactivity timeout in minutes
    #[arg(long, allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// Per-request HTTP timeout in seconds
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Maximum number of stop requests in flight at once
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Also evaluate sessions that have nothing playing
    #[arg(long)]
    pub include_stopped: bool,

    /// What to do with sessions that report no activity timestamp
    #[arg(long, value_enum)]
    pub missing_activity: Option<MissingActivityPolicy>,

    /// Only log what would be done without stopping any session
    #[arg(long)]
    pub dry_run: bool,

    /// Do not send an on-screen message to users whose session was stopped
    #[arg(long)]
    pub no_notify: bool,

    /// Keep running and repeat every N minutes (at most one year) instead of exiting
    #[arg(long)]
    pub interval: Option<u64>,

    /// Summary output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging (very verbose)
    #[arg(short, long)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Append logs to this file in addition to stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Format of the end-of-run summary written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Headline plus a table of per-session outcomes
    Text,
    /// Pretty-printed JSON document
    Json,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: None,
            server: None,
            api_key: None,
            timeout: None,
            request_timeout: None,
            max_concurrent: None,
            include_stopped: false,
            missing_activity: None,
            dry_run: false,
            no_notify: false,
            interval: None,
            output: OutputFormat::Text,
            verbose: false,
            debug: false,
            json_logs: false,
            log_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, None);
        assert!(!cli.dry_run);
        assert_eq!(cli.output, OutputFormat::Text);
    }

    #[test]
    fn test_cli_parse_required_trio() {
        let cli = Cli::try_parse_from([
            "jellyreaper",
            "--server",
            "http://jellyfin:8096",
            "--api-key",
            "secret",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.server.as_deref(), Some("http://jellyfin:8096"));
        assert_eq!(cli.api_key.as_deref(), Some("secret"));
        assert_eq!(cli.timeout, Some(30));
    }

    #[test]
    fn test_cli_parse_negative_timeout_is_left_for_validation() {
        let cli = Cli::try_parse_from(["jellyreaper", "--timeout", "-5"]).unwrap();
        assert_eq!(cli.timeout, Some(-5));
    }

    #[test]
    fn test_cli_parse_non_numeric_timeout_fails() {
        let cli = Cli::try_parse_from(["jellyreaper", "--timeout", "soon"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_parse_missing_activity_policy() {
        let cli = Cli::try_parse_from(["jellyreaper", "--missing-activity", "keep"]).unwrap();
        assert_eq!(cli.missing_activity, Some(MissingActivityPolicy::Keep));

        let cli = Cli::try_parse_from(["jellyreaper", "--missing-activity", "maybe"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_parse_flags() {
        let cli = Cli::try_parse_from([
            "jellyreaper",
            "--dry-run",
            "--no-notify",
            "--include-stopped",
            "-d",
            "--output",
            "json",
            "--interval",
            "5",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert!(cli.no_notify);
        assert!(cli.include_stopped);
        assert!(cli.debug);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.interval, Some(5));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::try_parse_from(["jellyreaper", "--config", "custom.yaml"]).unwrap();
        assert_eq!(cli.config, Some("custom.yaml".to_string()));
    }
}
