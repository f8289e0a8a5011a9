//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file
//! output. Logs go to stderr; stdout is reserved for the run summary.
//! `RUST_LOG` takes precedence over the configured level so an
//! operator can raise verbosity from the crontab line alone.

use crate::config::LoggingConfig;
use crate::error::{Result, ReaperError};
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the level filter for a logging configuration
///
/// # Errors
///
/// Returns `ReaperError::Config` if the configured level is not a valid
/// filter directive
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| {
        ReaperError::Config(format!("Invalid log level '{}': {}", config.level, e)).into()
    })
}

/// Initialize logging based on configuration.
///
/// Logs go to stderr, and additionally to `file_path` (append mode) when
/// configured.
///
/// # Arguments
///
/// * `config` - Logging configuration
///
/// # Returns
///
/// Returns success or error if logging initialization fails
///
/// # Errors
///
/// Returns `ReaperError::Config` for an invalid level, an IO error if the
/// log file cannot be opened, or an error if a global subscriber is already
/// installed
///
/// # Examples
///
/// ```no_run
/// use jellyreaper::config::LoggingConfig;
/// use jellyreaper::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     json_format: true,
///     file_path: None,
/// };
///
/// let result = init_logging(&config);
/// assert!(result.is_ok());
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(config)?);

    let file = match &config.file_path {
        Some(path) => Some(Arc::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(ReaperError::Io)?,
        )),
        None => None,
    };

    if config.json_format {
        let stderr_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr);
        let file_layer = file.map(|file| {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(file)
        });
        registry.with(stderr_layer).with(file_layer).try_init()?;
    } else {
        let stderr_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr);
        let file_layer = file.map(|file| {
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_ansi(false)
                .with_writer(file)
        });
        registry.with(stderr_layer).with(file_layer).try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json_format);
        assert_eq!(config.file_path, None);
    }

    #[test]
    #[serial_test::serial]
    fn test_env_filter_accepts_directives() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "jellyreaper=debug,reqwest=warn".to_string(),
            ..LoggingConfig::default()
        };
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    #[serial_test::serial]
    fn test_env_filter_rejects_garbage_level() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "jellyreaper=loud".to_string(),
            ..LoggingConfig::default()
        };
        let err = env_filter(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReaperError>(),
            Some(ReaperError::Config(_))
        ));
    }
}
