use chrono::{DateTime, TimeDelta, Utc};
use jellyreaper::config::{ApiKey, Config, Settings};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-api-key-1234";

/// Settings pointing at a mock server
#[allow(dead_code)]
pub fn settings_for(server: &MockServer, timeout_minutes: i64) -> Settings {
    let mut config = Config::default();
    config.server.url = Some(server.uri());
    config.server.api_key = Some(ApiKey::new(API_KEY));
    config.server.request_timeout_seconds = 2;
    config.reaper.timeout_minutes = Some(timeout_minutes);
    config.validate().expect("test settings are valid")
}

/// A Jellyfin session object paused `minutes` before `now`
pub fn paused_session(id: &str, minutes: i64, now: DateTime<Utc>) -> Value {
    json!({
        "Id": id,
        "UserId": format!("user-{}", id),
        "UserName": format!("user-{}", id),
        "Client": "Jellyfin Web",
        "DeviceName": "Firefox",
        "LastActivityDate": (now - TimeDelta::minutes(minutes)).to_rfc3339(),
        "LastPausedDate": (now - TimeDelta::minutes(minutes)).to_rfc3339(),
        "NowPlayingItem": {"Id": "item", "Name": "Big Buck Bunny", "Type": "Movie"},
        "PlayState": {"IsPaused": true, "PositionTicks": 12345}
    })
}

/// Serve `sessions` from `GET /Sessions`
pub async fn mount_sessions(server: &MockServer, sessions: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/Sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(sessions)))
        .mount(server)
        .await;
}

/// Answer `POST /Sessions/{id}/Playing/Stop` with `status`, expecting `times` calls
pub async fn mount_stop(server: &MockServer, id: &str, status: u16, times: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/Sessions/{}/Playing/Stop", id)))
        .respond_with(ResponseTemplate::new(status))
        .expect(times)
        .mount(server)
        .await;
}
