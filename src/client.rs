//! Media server client
//!
//! [`MediaServer`] is the seam between the reaper pipeline and the network.
//! [`JellyfinClient`] implements it against the Jellyfin REST API using the
//! `X-MediaBrowser-Token` header for authentication.

use crate::config::{Notification, Settings};
use crate::error::{Result, ReaperError};
use crate::session::{parse_sessions, Session};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Header carrying the API key
pub const AUTH_HEADER: &str = "X-MediaBrowser-Token";

/// Result of a stop request the server accepted or answered benignly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The server stopped playback
    Stopped,
    /// The session no longer exists (HTTP 404)
    NotFound,
}

/// Operations the reaper needs from a media server
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// List all active sessions
    ///
    /// # Errors
    ///
    /// `ReaperError::Network`, `ReaperError::Authentication`, or
    /// `ReaperError::Protocol`
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Stop playback of one session
    ///
    /// # Errors
    ///
    /// `ReaperError::Termination` on transport failure or a rejected request
    async fn stop_session(&self, session_id: &str) -> std::result::Result<StopOutcome, ReaperError>;

    /// Show a message on the session's client
    ///
    /// # Errors
    ///
    /// `ReaperError::Termination` on transport failure or a rejected request
    async fn send_message(
        &self,
        session_id: &str,
        notification: &Notification,
    ) -> std::result::Result<(), ReaperError>;
}

/// Jellyfin REST client
///
/// # Examples
///
/// ```no_run
/// use jellyreaper::client::{JellyfinClient, MediaServer};
/// use jellyreaper::config::{ApiKey, Config};
///
/// # async fn example() -> jellyreaper::error::Result<()> {
/// let mut config = Config::default();
/// config.server.url = Some("http://jellyfin:8096".to_string());
/// config.server.api_key = Some(ApiKey::new("api-key"));
/// config.reaper.timeout_minutes = Some(30);
///
/// let client = JellyfinClient::new(&config.validate()?)?;
/// let sessions = client.list_sessions().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct JellyfinClient {
    client: Client,
    base_url: Url,
    request_timeout: Duration,
}

impl JellyfinClient {
    /// Create a client for the configured server
    ///
    /// # Arguments
    ///
    /// * `settings` - Validated settings providing the URL, key, and request timeout
    ///
    /// # Returns
    ///
    /// Returns a client whose every request carries the API key header
    ///
    /// # Errors
    ///
    /// Returns `ReaperError::Config` if the API key cannot be sent as a
    /// header, or if the HTTP client cannot be built
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut token = HeaderValue::from_str(settings.api_key.expose()).map_err(|_| {
            ReaperError::Config("API key contains characters not allowed in a header".to_string())
        })?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, token);

        let client = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("jellyreaper/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| ReaperError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!(
            server = %settings.server_url,
            timeout_secs = settings.request_timeout.as_secs(),
            "Initialized media server client"
        );

        Ok(Self {
            client,
            base_url: settings.server_url.clone(),
            request_timeout: settings.request_timeout,
        })
    }

    /// Base URL with `segments` appended as escaped path segments
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn describe_send_error(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            format!(
                "request timed out after {}s",
                self.request_timeout.as_secs()
            )
        } else if error.is_connect() {
            format!("could not connect to {}", self.base_url)
        } else {
            error.to_string()
        }
    }
}

#[async_trait]
impl MediaServer for JellyfinClient {
    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let url = self.endpoint(&["Sessions"]);
        tracing::debug!(url = %url, "Fetching active sessions");

        let response = self.client.get(url).send().await.map_err(|e| {
            ReaperError::Network(format!(
                "Failed to fetch sessions: {}",
                self.describe_send_error(&e)
            ))
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ReaperError::Authentication(format!(
                "Server rejected the API key (HTTP {})",
                status.as_u16()
            ))
            .into());
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Server returned error {} for /Sessions: {}", status, error_text);
            return Err(ReaperError::Network(format!(
                "Server returned HTTP {} for /Sessions",
                status.as_u16()
            ))
            .into());
        }

        let body = response.text().await.map_err(|e| {
            ReaperError::Network(format!(
                "Failed to read session list: {}",
                self.describe_send_error(&e)
            ))
        })?;

        let sessions = parse_sessions(&body)?;
        tracing::debug!("Fetched {} sessions", sessions.len());
        Ok(sessions)
    }

    async fn stop_session(&self, session_id: &str) -> std::result::Result<StopOutcome, ReaperError> {
        let url = self.endpoint(&["Sessions", session_id, "Playing", "Stop"]);

        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| ReaperError::Termination {
                session_id: session_id.to_string(),
                reason: self.describe_send_error(&e),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(StopOutcome::NotFound);
        }
        if !status.is_success() {
            return Err(ReaperError::Termination {
                session_id: session_id.to_string(),
                reason: format!("server returned HTTP {}", status.as_u16()),
            });
        }

        Ok(StopOutcome::Stopped)
    }

    async fn send_message(
        &self,
        session_id: &str,
        notification: &Notification,
    ) -> std::result::Result<(), ReaperError> {
        let url = self.endpoint(&["Sessions", session_id, "Message"]);

        let response = self
            .client
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(|e| ReaperError::Termination {
                session_id: session_id.to_string(),
                reason: format!("message not delivered: {}", self.describe_send_error(&e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReaperError::Termination {
                session_id: session_id.to_string(),
                reason: format!("message rejected with HTTP {}", status.as_u16()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, Config};

    fn settings(url: &str) -> Settings {
        let mut config = Config::default();
        config.server.url = Some(url.to_string());
        config.server.api_key = Some(ApiKey::new("secret"));
        config.reaper.timeout_minutes = Some(30);
        config.validate().unwrap()
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let client = JellyfinClient::new(&settings("http://jellyfin:8096")).unwrap();
        assert_eq!(
            client.endpoint(&["Sessions"]).as_str(),
            "http://jellyfin:8096/Sessions"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = JellyfinClient::new(&settings("https://example.com/jellyfin/")).unwrap();
        assert_eq!(
            client.endpoint(&["Sessions", "abc", "Playing", "Stop"]).as_str(),
            "https://example.com/jellyfin/Sessions/abc/Playing/Stop"
        );
    }

    #[test]
    fn test_endpoint_escapes_session_ids() {
        let client = JellyfinClient::new(&settings("http://jellyfin:8096")).unwrap();
        let url = client.endpoint(&["Sessions", "a/b?c", "Playing", "Stop"]);
        assert_eq!(url.path(), "/Sessions/a%2Fb%3Fc/Playing/Stop");
    }

    #[test]
    fn test_new_rejects_unsendable_key() {
        let mut s = settings("http://jellyfin:8096");
        s.api_key = ApiKey::new("bad\nkey");
        let err = JellyfinClient::new(&s).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReaperError>(),
            Some(ReaperError::Config(_))
        ));
        assert!(!err.to_string().contains("bad\nkey"));
    }

    #[test]
    fn test_client_debug_does_not_leak_key() {
        let client = JellyfinClient::new(&settings("http://jellyfin:8096")).unwrap();
        assert!(!format!("{:?}", client).contains("secret"));
    }
}
