//! Session termination
//!
//! Sends one stop request per qualifying session. Requests run concurrently
//! up to `max_concurrent_terminations`; results come back in input order.
//! A failed stop is recorded as [`TerminationOutcome::Failed`] and never
//! prevents the remaining sessions from being processed. The optional
//! notification is sent only after the server confirmed the stop.

use crate::client::{MediaServer, StopOutcome};
use crate::config::{Notification, Settings};
use crate::error::ReaperError;
use crate::evaluator::{format_duration, Decision, Verdict};
use chrono::TimeDelta;
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// A session selected for termination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationTarget {
    /// Server session id
    pub session_id: String,
    /// Human description (user, device, client)
    pub label: String,
    /// Loaded media item name
    pub media: String,
    /// Observed idle duration, `None` if unknown
    pub idle: Option<TimeDelta>,
}

impl TerminationTarget {
    /// Build a target from a qualifying decision
    ///
    /// Returns `None` for decisions that do not qualify.
    pub fn from_decision(decision: &Decision) -> Option<Self> {
        match decision.verdict {
            Verdict::Qualifies { idle } => Some(Self {
                session_id: decision.session.id.clone(),
                label: decision.session.label(),
                media: decision.session.media_name().to_string(),
                idle,
            }),
            _ => None,
        }
    }
}

/// What happened to one qualifying session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TerminationOutcome {
    /// The server stopped the session
    Terminated,
    /// The session was gone by the time the stop request arrived
    AlreadyEnded,
    /// Dry run; no request was sent
    DryRun,
    /// The stop request failed
    Failed {
        /// Transport or status description
        reason: String,
    },
}

/// Per-session termination record consumed by reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TerminationResult {
    /// Server session id
    pub session_id: String,
    /// Human description (user, device, client)
    pub label: String,
    /// Observed idle time in whole seconds, if known
    pub idle_seconds: Option<i64>,
    /// Outcome of the stop request
    #[serde(flatten)]
    pub outcome: TerminationOutcome,
}

impl TerminationResult {
    /// Whether the request failed
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, TerminationOutcome::Failed { .. })
    }
}

/// Termination settings derived from configuration
#[derive(Debug, Clone)]
pub struct TerminatorOptions {
    /// Maximum stop requests in flight
    pub max_concurrent: usize,
    /// Report only, never send requests
    pub dry_run: bool,
    /// Message sent after a confirmed stop, if any
    pub notification: Option<Notification>,
}

impl From<&Settings> for TerminatorOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent_terminations,
            dry_run: settings.dry_run,
            notification: settings.notification.clone(),
        }
    }
}

/// Stop every target, returning one result per target in input order
///
/// # Arguments
///
/// * `server` - Media server receiving the stop requests
/// * `targets` - Qualifying sessions, in fetch order
/// * `options` - Concurrency limit, dry-run flag, and notification
pub async fn terminate_all(
    server: &dyn MediaServer,
    targets: &[TerminationTarget],
    options: &TerminatorOptions,
) -> Vec<TerminationResult> {
    let semaphore = Semaphore::new(options.max_concurrent.max(1));

    let tasks = targets.iter().map(|target| {
        let semaphore = &semaphore;
        async move {
            let _permit = semaphore.acquire().await.ok();
            terminate_one(server, target, options).await
        }
    });

    join_all(tasks).await
}

async fn terminate_one(
    server: &dyn MediaServer,
    target: &TerminationTarget,
    options: &TerminatorOptions,
) -> TerminationResult {
    let idle = target
        .idle
        .map(format_duration)
        .unwrap_or_else(|| "unknown".to_string());

    let outcome = if options.dry_run {
        info!(
            session_id = %target.session_id,
            idle = %idle,
            "DRY RUN: would stop session for {} playing {}",
            target.label,
            target.media
        );
        TerminationOutcome::DryRun
    } else {
        match server.stop_session(&target.session_id).await {
            Ok(StopOutcome::Stopped) => {
                info!(
                    session_id = %target.session_id,
                    idle = %idle,
                    "Stopped inactive session for {} playing {}",
                    target.label,
                    target.media
                );
                // Only a confirmed stop is announced
                if let Some(notification) = &options.notification {
                    if let Err(e) = server.send_message(&target.session_id, notification).await {
                        warn!(session_id = %target.session_id, "Could not notify user: {}", e);
                    }
                }
                TerminationOutcome::Terminated
            }
            Ok(StopOutcome::NotFound) => {
                info!(
                    session_id = %target.session_id,
                    "Session for {} had already ended",
                    target.label
                );
                TerminationOutcome::AlreadyEnded
            }
            Err(e) => {
                error!(session_id = %target.session_id, "Failed to stop session: {}", e);
                let reason = match e {
                    ReaperError::Termination { reason, .. } => reason,
                    other => other.to_string(),
                };
                TerminationOutcome::Failed { reason }
            }
        }
    };

    TerminationResult {
        session_id: target.session_id.clone(),
        label: target.label.clone(),
        idle_seconds: target.idle.map(|d| d.num_seconds()),
        outcome,
    }
}
