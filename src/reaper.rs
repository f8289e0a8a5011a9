//! Run pipeline
//!
//! One run is a linear pipeline: fetch the sessions, evaluate them, stop the
//! qualifying ones, summarize. A fetch failure ends the run with an error;
//! per-session stop failures are part of the summary.
//!
//! [`Reaper::run_periodically`] repeats runs in-process for deployments
//! without cron. Each iteration is independent of the previous one.

use crate::client::MediaServer;
use crate::config::Settings;
use crate::error::Result;
use crate::evaluator::{evaluate, format_duration, Evaluation, EvaluationPolicy, Verdict};
use crate::report::RunSummary;
use crate::session::PlaybackState;
use crate::terminator::{terminate_all, TerminationTarget, TerminatorOptions};
use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, Instrument};

/// Stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Settings loaded, nothing sent yet
    NotStarted,
    /// Waiting for the session list
    Fetching,
    /// Deciding which sessions qualify
    Evaluating,
    /// Sending stop requests
    Terminating,
    /// Summary produced
    Done,
    /// Aborted before any stop request
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::NotStarted => "not_started",
            RunPhase::Fetching => "fetching",
            RunPhase::Evaluating => "evaluating",
            RunPhase::Terminating => "terminating",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Inactive session reaper
///
/// # Examples
///
/// ```no_run
/// use jellyreaper::client::JellyfinClient;
/// use jellyreaper::config::{ApiKey, Config};
/// use jellyreaper::reaper::Reaper;
///
/// # async fn example() -> jellyreaper::error::Result<()> {
/// let mut config = Config::default();
/// config.server.url = Some("http://jellyfin:8096".to_string());
/// config.server.api_key = Some(ApiKey::new("api-key"));
/// config.reaper.timeout_minutes = Some(30);
/// let settings = config.validate()?;
///
/// let client = JellyfinClient::new(&settings)?;
/// let summary = Reaper::new(settings, client).run_once().await?;
/// println!("{}", summary.headline());
/// # Ok(())
/// # }
/// ```
pub struct Reaper<S> {
    settings: Settings,
    server: S,
}

impl<S: MediaServer> Reaper<S> {
    /// Create a reaper over a media server
    ///
    /// # Arguments
    ///
    /// * `settings` - Validated run settings
    /// * `server` - Media server the sessions are fetched from and stopped on
    pub fn new(settings: Settings, server: S) -> Self {
        Self { settings, server }
    }

    /// Execute one run against the current time
    ///
    /// # Errors
    ///
    /// Returns the fetch error (`Network`, `Authentication`, or `Protocol`);
    /// no stop request is sent in that case
    pub async fn run_once(&self) -> Result<RunSummary> {
        self.run_at(Utc::now()).await
    }

    /// Execute one run, measuring idle time against `now`
    ///
    /// # Errors
    ///
    /// Returns the fetch error; no stop request is sent in that case
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let span = tracing::info_span!("run", server = %self.settings.server_url);
        self.pipeline(now).instrument(span).await
    }

    async fn pipeline(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let settings = &self.settings;
        let mut phase = RunPhase::NotStarted;
        debug!(%phase, dry_run = settings.dry_run, "Starting run");

        phase = RunPhase::Fetching;
        debug!(%phase, "Fetching sessions");
        let sessions = match self.server.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                phase = RunPhase::Failed;
                error!(%phase, "Aborting run: {}", e);
                return Err(e);
            }
        };

        phase = RunPhase::Evaluating;
        debug!(%phase, fetched = sessions.len(), "Evaluating sessions");
        let evaluation = evaluate(sessions, &EvaluationPolicy::from(settings), now);
        log_decisions(&evaluation);

        phase = RunPhase::Terminating;
        let targets: Vec<_> = evaluation
            .decisions
            .iter()
            .filter_map(TerminationTarget::from_decision)
            .collect();
        debug!(%phase, qualifying = targets.len(), "Terminating sessions");
        let results = terminate_all(
            &self.server,
            &targets,
            &TerminatorOptions::from(settings),
        )
        .await;

        let summary = RunSummary::new(
            settings.server_url.as_str(),
            settings.idle_timeout,
            settings.dry_run,
            &evaluation,
            results,
        );
        phase = RunPhase::Done;
        debug!(%phase, "Run finished");
        summary.log();
        Ok(summary)
    }

    /// Run every `period` until `shutdown` resolves
    ///
    /// The first run starts immediately. A failed run is logged and the loop
    /// continues. `shutdown` also interrupts a run in progress. Returns the
    /// number of runs that completed.
    pub async fn run_periodically<F, H>(&self, period: Duration, shutdown: F, mut on_summary: H) -> usize
    where
        F: Future<Output = ()>,
        H: FnMut(&RunSummary),
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut completed = 0;

        info!(period_secs = period.as_secs(), "Running periodically");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = &mut shutdown => break,
                outcome = self.run_once() => {
                    completed += 1;
                    match outcome {
                        Ok(summary) => on_summary(&summary),
                        Err(e) => error!("Run failed, retrying in {}s: {:#}", period.as_secs(), e),
                    }
                }
            }
        }

        info!(runs = completed, "Stopped");
        completed
    }
}

fn log_decisions(evaluation: &Evaluation) {
    for decision in &evaluation.decisions {
        let session = &decision.session;
        match decision.verdict {
            Verdict::Qualifies { idle: Some(idle) } => info!(
                session_id = %session.id,
                "Found inactive {} session for {}; media: {}, inactive for {}",
                session.state,
                session.label(),
                session.media_name(),
                format_duration(idle)
            ),
            Verdict::Qualifies { idle: None } => info!(
                session_id = %session.id,
                "Session for {} reports no activity time; treating it as inactive",
                session.label()
            ),
            Verdict::BelowThreshold { idle, remaining } if session.state != PlaybackState::Playing => {
                info!(
                    session_id = %session.id,
                    "Session for {} is {} ({}), will be terminated in {}",
                    session.label(),
                    session.state,
                    format_duration(idle),
                    format_duration(remaining)
                )
            }
            Verdict::BelowThreshold { .. } => debug!(
                session_id = %session.id,
                "Session for {} is playing",
                session.label()
            ),
            Verdict::Skipped(reason) => debug!(
                session_id = %session.id,
                %reason,
                "Skipping session for {}",
                session.label()
            ),
        }
    }
}
