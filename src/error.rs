//! Error types for jellyreaper
//!
//! This module defines the error taxonomy of a reaper run using `thiserror`.
//! Fatal categories (`Config`, `Authentication`, `Network`, `Protocol`) abort
//! the run; `Termination` is recorded per session and never aborts.

use thiserror::Error;

/// Main error type for jellyreaper operations
///
/// Messages never contain the API key. Variants carry only the URL path,
/// status codes, and transport descriptions.
#[derive(Error, Debug)]
pub enum ReaperError {
    /// Invalid or missing startup parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// The media server rejected the API key (401/403)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Connection failure, timeout, or transient server failure
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with something that is not a session list
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A single session could not be stopped
    #[error("Termination of session {session_id} failed: {reason}")]
    Termination {
        /// Session the stop request was sent for
        session_id: String,
        /// Transport or status description
        reason: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ReaperError {
    /// Process exit code for a run that failed with this error
    ///
    /// # Examples
    ///
    /// ```
    /// use jellyreaper::error::ReaperError;
    ///
    /// assert_eq!(ReaperError::Config("missing server".into()).exit_code(), 2);
    /// assert_eq!(ReaperError::Network("refused".into()).exit_code(), 4);
    /// ```
    pub fn exit_code(&self) -> u8 {
        match self {
            ReaperError::Config(_) | ReaperError::Yaml(_) => 2,
            ReaperError::Authentication(_) => 3,
            ReaperError::Network(_) => 4,
            ReaperError::Protocol(_) | ReaperError::Serialization(_) => 5,
            ReaperError::Termination { .. } | ReaperError::Io(_) => 1,
        }
    }
}

/// Exit code for an arbitrary run error
///
/// Falls back to 1 when the error did not originate from [`ReaperError`].
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    error
        .downcast_ref::<ReaperError>()
        .map(ReaperError::exit_code)
        .unwrap_or(1)
}

/// Result type alias for jellyreaper operations
///
/// Uses `anyhow::Error` so callers can attach context; the category is
/// recovered with `downcast_ref::<ReaperError>()`.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ReaperError::Config("timeout must be greater than 0".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: timeout must be greater than 0"
        );
    }

    #[test]
    fn test_termination_error_display() {
        let error = ReaperError::Termination {
            session_id: "abc123".to_string(),
            reason: "HTTP 500".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Termination of session abc123 failed: HTTP 500"
        );
    }

    #[test]
    fn test_exit_codes_by_category() {
        assert_eq!(ReaperError::Config("x".into()).exit_code(), 2);
        assert_eq!(ReaperError::Authentication("x".into()).exit_code(), 3);
        assert_eq!(ReaperError::Network("x".into()).exit_code(), 4);
        assert_eq!(ReaperError::Protocol("x".into()).exit_code(), 5);
    }

    #[test]
    fn test_exit_code_for_downcasts_anyhow() {
        let err: anyhow::Error = ReaperError::Authentication("401".into()).into();
        assert_eq!(exit_code_for(&err), 3);

        let err = err.context("fetching sessions");
        assert_eq!(exit_code_for(&err), 3);

        let other = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&other), 1);
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: ReaperError = yaml_error.into();
        assert!(matches!(error, ReaperError::Yaml(_)));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReaperError>();
    }
}
