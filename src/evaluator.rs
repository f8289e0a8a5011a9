//! Inactivity evaluation
//!
//! A pure decision over the fetched sessions: no I/O, no clock access. The
//! caller supplies `now`, which keeps the boundary behaviour testable.
//!
//! A session qualifies for termination iff its idle duration is at least the
//! configured timeout. Sessions that report no usable timestamp follow the
//! configured [`MissingActivityPolicy`].

use crate::config::{MissingActivityPolicy, Settings};
use crate::session::{PlaybackState, Session};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::fmt;

/// Inputs of the evaluation that come from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationPolicy {
    /// Sessions idle at least this long qualify
    pub idle_timeout: TimeDelta,
    /// Evaluate sessions that have nothing playing
    pub include_stopped: bool,
    /// Policy for sessions without any timestamp
    pub missing_activity: MissingActivityPolicy,
}

impl From<&Settings> for EvaluationPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            idle_timeout: settings.idle_timeout,
            include_stopped: settings.include_stopped,
            missing_activity: settings.missing_activity,
        }
    }
}

/// Why a session was not evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Server-internal session without a user
    NoUser,
    /// Nothing playing and stopped sessions are excluded
    NotPlaying,
    /// No timestamp and the policy is `keep`
    NoActivityTimestamp,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoUser => write!(f, "no user"),
            SkipReason::NotPlaying => write!(f, "nothing playing"),
            SkipReason::NoActivityTimestamp => write!(f, "no activity timestamp"),
        }
    }
}

/// Outcome of evaluating one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Idle at least the timeout; `idle` is `None` when it could not be
    /// determined and the policy is `terminate`
    Qualifies {
        /// Observed idle duration
        idle: Option<TimeDelta>,
    },
    /// Idle less than the timeout
    BelowThreshold {
        /// Observed idle duration
        idle: TimeDelta,
        /// Time left until the session would qualify
        remaining: TimeDelta,
    },
    /// Not evaluated
    Skipped(SkipReason),
}

impl Verdict {
    /// Whether the session should be stopped
    pub fn qualifies(&self) -> bool {
        matches!(self, Verdict::Qualifies { .. })
    }
}

/// A session paired with its verdict
#[derive(Debug, Clone)]
pub struct Decision {
    /// The evaluated session
    pub session: Session,
    /// What the evaluator decided
    pub verdict: Verdict,
}

/// Verdicts for every fetched session, in fetch order
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// One decision per fetched session
    pub decisions: Vec<Decision>,
}

impl Evaluation {
    /// Sessions to stop, in fetch order
    pub fn qualifying(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(|d| d.verdict.qualifies())
    }

    /// Ids of the sessions to stop, in fetch order
    pub fn qualifying_ids(&self) -> Vec<&str> {
        self.qualifying().map(|d| d.session.id.as_str()).collect()
    }

    /// Number of sessions that qualified
    pub fn qualifying_count(&self) -> usize {
        self.qualifying().count()
    }

    /// Number of sessions that were evaluated (not skipped)
    pub fn evaluated_count(&self) -> usize {
        self.decisions.len() - self.skipped_count()
    }

    /// Number of sessions that were skipped
    pub fn skipped_count(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| matches!(d.verdict, Verdict::Skipped(_)))
            .count()
    }

    /// Number of evaluated sessions below the threshold
    pub fn below_threshold_count(&self) -> usize {
        self.decisions
            .iter()
            .filter(|d| matches!(d.verdict, Verdict::BelowThreshold { .. }))
            .count()
    }
}

/// Decide the fate of a single session at `now`
///
/// # Examples
///
/// ```
/// use chrono::{TimeDelta, TimeZone, Utc};
/// use jellyreaper::config::MissingActivityPolicy;
/// use jellyreaper::evaluator::{decide, EvaluationPolicy, Verdict};
/// use jellyreaper::session::{PlaybackState, Session};
///
/// let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
/// let policy = EvaluationPolicy {
///     idle_timeout: TimeDelta::minutes(45),
///     include_stopped: false,
///     missing_activity: MissingActivityPolicy::Terminate,
/// };
/// let session = Session {
///     id: "s1".into(),
///     user_id: Some("u1".into()),
///     user_name: None,
///     client: None,
///     device_name: None,
///     state: PlaybackState::Paused,
///     now_playing: None,
///     last_activity: None,
///     last_paused: Some(now - TimeDelta::minutes(45)),
/// };
/// assert!(decide(&session, &policy, now).qualifies());
/// ```
pub fn decide(session: &Session, policy: &EvaluationPolicy, now: DateTime<Utc>) -> Verdict {
    if session.user_id.is_none() {
        return Verdict::Skipped(SkipReason::NoUser);
    }
    if session.state == PlaybackState::Stopped && !policy.include_stopped {
        return Verdict::Skipped(SkipReason::NotPlaying);
    }

    match session.idle_duration(now) {
        Some(idle) if idle >= policy.idle_timeout => Verdict::Qualifies { idle: Some(idle) },
        Some(idle) => Verdict::BelowThreshold {
            idle,
            remaining: policy.idle_timeout - idle,
        },
        None => match policy.missing_activity {
            MissingActivityPolicy::Terminate => Verdict::Qualifies { idle: None },
            MissingActivityPolicy::Keep => Verdict::Skipped(SkipReason::NoActivityTimestamp),
        },
    }
}

/// Evaluate every fetched session at `now`, preserving order
pub fn evaluate(sessions: Vec<Session>, policy: &EvaluationPolicy, now: DateTime<Utc>) -> Evaluation {
    let decisions = sessions
        .into_iter()
        .map(|session| {
            let verdict = decide(&session, policy, now);
            Decision { session, verdict }
        })
        .collect();
    Evaluation { decisions }
}

/// Render a duration as `H:MM:SS`
pub fn format_duration(duration: TimeDelta) -> String {
    let total = duration.num_seconds().max(0);
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
