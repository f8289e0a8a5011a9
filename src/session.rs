//! Session model and Jellyfin wire decoding
//!
//! The server reports sessions as PascalCase JSON objects carrying far more
//! fields than the reaper needs. This module decodes the subset used for
//! idle evaluation into [`Session`].

use crate::error::{Result, ReaperError};
use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Media loaded and playing
    Playing,
    /// Media loaded and paused
    Paused,
    /// Nothing loaded (browsing, idle client)
    Stopped,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Media item a session has loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Server item id
    pub id: Option<String>,
    /// Display name
    pub name: String,
}

/// One active session as observed at fetch time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Server session id
    pub id: String,
    /// Owning user, `None` for server-internal sessions
    pub user_id: Option<String>,
    /// Owning user's display name
    pub user_name: Option<String>,
    /// Client application name
    pub client: Option<String>,
    /// Device name
    pub device_name: Option<String>,
    /// Playback state
    pub state: PlaybackState,
    /// Loaded media item
    pub now_playing: Option<MediaItem>,
    /// Last time the server saw any activity from this session
    pub last_activity: Option<DateTime<Utc>>,
    /// Moment playback was paused, if the server reports it
    pub last_paused: Option<DateTime<Utc>>,
}

impl Session {
    /// Timestamp idle time is measured from
    ///
    /// Paused sessions prefer the pause moment and fall back to the last
    /// activity. Playing sessions have no idle reference.
    pub fn idle_since(&self) -> Option<DateTime<Utc>> {
        match self.state {
            PlaybackState::Playing => None,
            PlaybackState::Paused => self.last_paused.or(self.last_activity),
            PlaybackState::Stopped => self.last_activity,
        }
    }

    /// Idle duration at `now`
    ///
    /// Playing sessions are never idle. Returns `None` when the session is
    /// not playing and reports no usable timestamp. Timestamps ahead of
    /// `now` (clock skew) count as zero idle time.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeDelta, TimeZone, Utc};
    /// use jellyreaper::session::{PlaybackState, Session};
    ///
    /// let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    /// let session = Session {
    ///     id: "s1".into(),
    ///     user_id: Some("u1".into()),
    ///     user_name: None,
    ///     client: None,
    ///     device_name: None,
    ///     state: PlaybackState::Paused,
    ///     now_playing: None,
    ///     last_activity: Some(now - TimeDelta::minutes(50)),
    ///     last_paused: Some(now - TimeDelta::minutes(45)),
    /// };
    /// assert_eq!(session.idle_duration(now), Some(TimeDelta::minutes(45)));
    /// ```
    pub fn idle_duration(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        if self.state == PlaybackState::Playing {
            return Some(TimeDelta::zero());
        }
        self.idle_since()
            .map(|since| (now - since).max(TimeDelta::zero()))
    }

    /// Short human description used in log lines and the summary
    pub fn label(&self) -> String {
        format!(
            "{} on {} ({})",
            self.user_name.as_deref().unwrap_or("Unknown User"),
            self.device_name.as_deref().unwrap_or("Unknown device"),
            self.client.as_deref().unwrap_or("Unknown client"),
        )
    }

    /// Name of the loaded media item, if any
    pub fn media_name(&self) -> &str {
        self.now_playing
            .as_ref()
            .map(|item| item.name.as_str())
            .unwrap_or("Unknown media")
    }
}

/// Session object from `GET /Sessions`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireSession {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    client: Option<String>,
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    now_playing_item: Option<WireItem>,
    #[serde(default)]
    play_state: Option<WirePlayState>,
    #[serde(default)]
    last_activity_date: Option<String>,
    #[serde(default)]
    last_paused_date: Option<String>,
}

/// `NowPlayingItem` of a session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// `PlayState` of a session
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WirePlayState {
    #[serde(default)]
    is_paused: bool,
}

/// Decode the body of `GET /Sessions`
///
/// # Errors
///
/// Returns `ReaperError::Protocol` if the body is not a JSON array of
/// session objects, a session has no id, or a timestamp is malformed
pub fn parse_sessions(body: &str) -> Result<Vec<Session>> {
    let wire: Vec<WireSession> = serde_json::from_str(body).map_err(|e| {
        ReaperError::Protocol(format!("Session list is not in the expected format: {}", e))
    })?;

    wire.into_iter()
        .enumerate()
        .map(|(index, session)| session.into_session(index))
        .collect()
}

impl WireSession {
    fn into_session(self, index: usize) -> Result<Session> {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ReaperError::Protocol(format!("Session #{} has no Id", index)))?;

        let is_paused = self.play_state.unwrap_or_default().is_paused;
        let now_playing = self.now_playing_item.map(|item| MediaItem {
            id: item.id,
            name: item.name.unwrap_or_else(|| "Unknown media".to_string()),
        });
        let state = match (&now_playing, is_paused) {
            (None, _) => PlaybackState::Stopped,
            (Some(_), true) => PlaybackState::Paused,
            (Some(_), false) => PlaybackState::Playing,
        };

        Ok(Session {
            last_activity: parse_timestamp(&id, self.last_activity_date.as_deref())?,
            last_paused: parse_timestamp(&id, self.last_paused_date.as_deref())?,
            user_id: self.user_id.filter(|user| !is_nil_id(user)),
            user_name: self.user_name,
            client: self.client,
            device_name: self.device_name,
            state,
            now_playing,
            id,
        })
    }
}

/// Empty ids and the all-zero GUID mean "no user"
fn is_nil_id(id: &str) -> bool {
    id.chars().all(|c| c == '0' || c == '-')
}

/// Parse a server timestamp; the `0001-01-01` sentinel means unset
fn parse_timestamp(session_id: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };

    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .map_err(|e| {
            ReaperError::Protocol(format!(
                "Session {} has malformed timestamp '{}': {}",
                session_id, raw, e
            ))
        })?;

    if parsed.year() <= 1 {
        return Ok(None);
    }
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn session(state: PlaybackState) -> Session {
        Session {
            id: "s1".to_string(),
            user_id: Some("u1".to_string()),
            user_name: Some("alice".to_string()),
            client: Some("Jellyfin Web".to_string()),
            device_name: Some("Firefox".to_string()),
            state,
            now_playing: None,
            last_activity: None,
            last_paused: None,
        }
    }

    #[test]
    fn test_parse_full_session() {
        let body = r#"[{
            "Id": "abc",
            "UserId": "4fd2",
            "UserName": "alice",
            "Client": "Jellyfin Web",
            "DeviceName": "Firefox",
            "LastActivityDate": "2024-05-01T11:10:00.1234567Z",
            "LastPausedDate": "2024-05-01T11:15:00Z",
            "NowPlayingItem": {"Id": "item1", "Name": "Big Buck Bunny", "Type": "Movie"},
            "PlayState": {"IsPaused": true, "PositionTicks": 1000},
            "SupportsRemoteControl": true
        }]"#;

        let sessions = parse_sessions(body).unwrap();
        assert_eq!(sessions.len(), 1);
        let s = &sessions[0];
        assert_eq!(s.id, "abc");
        assert_eq!(s.user_id.as_deref(), Some("4fd2"));
        assert_eq!(s.state, PlaybackState::Paused);
        assert_eq!(s.media_name(), "Big Buck Bunny");
        assert_eq!(
            s.last_paused,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 15, 0).unwrap())
        );
        assert_eq!(s.idle_duration(now()), Some(TimeDelta::minutes(45)));
        assert_eq!(s.label(), "alice on Firefox (Jellyfin Web)");
    }

    #[test]
    fn test_parse_playback_states() {
        let body = r#"[
            {"Id": "a", "NowPlayingItem": {"Name": "x"}, "PlayState": {"IsPaused": false}},
            {"Id": "b", "NowPlayingItem": {"Name": "x"}, "PlayState": {"IsPaused": true}},
            {"Id": "c", "PlayState": {}},
            {"Id": "d"}
        ]"#;
        let states: Vec<_> = parse_sessions(body)
            .unwrap()
            .into_iter()
            .map(|s| s.state)
            .collect();
        assert_eq!(
            states,
            vec![
                PlaybackState::Playing,
                PlaybackState::Paused,
                PlaybackState::Stopped,
                PlaybackState::Stopped
            ]
        );
    }

    #[test]
    fn test_parse_sentinel_dates_and_nil_user() {
        let body = r#"[{
            "Id": "a",
            "UserId": "00000000000000000000000000000000",
            "LastActivityDate": "0001-01-01T00:00:00.0000000Z",
            "LastPausedDate": ""
        }]"#;
        let s = &parse_sessions(body).unwrap()[0];
        assert_eq!(s.user_id, None);
        assert_eq!(s.last_activity, None);
        assert_eq!(s.last_paused, None);
    }

    #[test]
    fn test_parse_timestamp_without_offset_is_utc() {
        let body = r#"[{"Id": "a", "LastActivityDate": "2024-05-01T11:00:00.5"}]"#;
        let s = &parse_sessions(body).unwrap()[0];
        assert_eq!(
            s.last_activity.unwrap().timestamp(),
            Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap().timestamp()
        );
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_sessions("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = parse_sessions(r#"{"Items": []}"#).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReaperError>(),
            Some(ReaperError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_rejects_missing_id() {
        let err = parse_sessions(r#"[{"Id": "a"}, {"UserName": "bob"}]"#).unwrap_err();
        assert!(err.to_string().contains("#1 has no Id"));
    }

    #[test]
    fn test_parse_rejects_malformed_timestamp() {
        let err = parse_sessions(r#"[{"Id": "a", "LastActivityDate": "yesterday"}]"#).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReaperError>(),
            Some(ReaperError::Protocol(_))
        ));
    }

    #[test]
    fn test_idle_duration_by_state() {
        let mut playing = session(PlaybackState::Playing);
        playing.last_activity = Some(now() - TimeDelta::hours(3));
        assert_eq!(playing.idle_duration(now()), Some(TimeDelta::zero()));

        let mut paused = session(PlaybackState::Paused);
        paused.last_activity = Some(now() - TimeDelta::minutes(10));
        assert_eq!(paused.idle_duration(now()), Some(TimeDelta::minutes(10)));

        let mut stopped = session(PlaybackState::Stopped);
        stopped.last_paused = Some(now() - TimeDelta::minutes(90));
        assert_eq!(stopped.idle_duration(now()), None);
        stopped.last_activity = Some(now() - TimeDelta::minutes(20));
        assert_eq!(stopped.idle_duration(now()), Some(TimeDelta::minutes(20)));
    }

    #[test]
    fn test_idle_duration_clamps_future_timestamps() {
        let mut paused = session(PlaybackState::Paused);
        paused.last_paused = Some(now() + TimeDelta::minutes(2));
        assert_eq!(paused.idle_duration(now()), Some(TimeDelta::zero()));
    }

    #[test]
    fn test_label_defaults() {
        let mut s = session(PlaybackState::Stopped);
        s.user_name = None;
        s.device_name = None;
        s.client = None;
        assert_eq!(s.label(), "Unknown User on Unknown device (Unknown client)");
        assert_eq!(s.media_name(), "Unknown media");
    }
}
