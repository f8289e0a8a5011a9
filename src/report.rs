//! End-of-run reporting
//!
//! Builds a [`RunSummary`] from the evaluation and the termination results
//! and renders it as text (headline plus a table) or JSON. Nothing here has
//! access to the API key.

use crate::cli::OutputFormat;
use crate::error::{Result, ReaperError};
use crate::evaluator::{format_duration, Evaluation};
use crate::terminator::{TerminationOutcome, TerminationResult};
use chrono::TimeDelta;
use prettytable::{row, Table};
use serde::Serialize;
use std::fmt;

/// Counts and per-session outcomes of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Server the run talked to
    pub server: String,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Configured inactivity timeout in minutes
    pub timeout_minutes: i64,
    /// Sessions returned by the server
    pub fetched: usize,
    /// Sessions the evaluator considered
    pub evaluated: usize,
    /// Sessions skipped without evaluation
    pub skipped: usize,
    /// Evaluated sessions below the threshold
    pub below_threshold: usize,
    /// Sessions that qualified for termination
    pub qualifying: usize,
    /// Sessions the server stopped
    pub terminated: usize,
    /// Sessions gone before the stop request arrived
    pub already_ended: usize,
    /// Stop requests that failed
    pub failed: usize,
    /// Sessions a dry run would have stopped
    pub would_terminate: usize,
    /// One record per qualifying session, in fetch order
    pub results: Vec<TerminationResult>,
}

impl RunSummary {
    /// Summarize a completed run
    ///
    /// # Arguments
    ///
    /// * `server` - Server URL shown in the summary
    /// * `timeout` - Configured inactivity timeout
    /// * `dry_run` - Whether stop requests were suppressed
    /// * `evaluation` - Verdicts for every fetched session
    /// * `results` - One termination result per qualifying session
    pub fn new(
        server: &str,
        timeout: TimeDelta,
        dry_run: bool,
        evaluation: &Evaluation,
        results: Vec<TerminationResult>,
    ) -> Self {
        let count = |wanted: fn(&TerminationOutcome) -> bool| {
            results.iter().filter(|r| wanted(&r.outcome)).count()
        };

        Self {
            server: server.to_string(),
            dry_run,
            timeout_minutes: timeout.num_minutes(),
            fetched: evaluation.decisions.len(),
            evaluated: evaluation.evaluated_count(),
            skipped: evaluation.skipped_count(),
            below_threshold: evaluation.below_threshold_count(),
            qualifying: evaluation.qualifying_count(),
            terminated: count(|o| matches!(o, TerminationOutcome::Terminated)),
            already_ended: count(|o| matches!(o, TerminationOutcome::AlreadyEnded)),
            failed: count(|o| matches!(o, TerminationOutcome::Failed { .. })),
            would_terminate: count(|o| matches!(o, TerminationOutcome::DryRun)),
            results,
        }
    }

    /// One-line description of the run
    pub fn headline(&self) -> String {
        let counts = format!(
            "fetched {}, evaluated {}, skipped {}",
            self.fetched, self.evaluated, self.skipped
        );
        if self.dry_run {
            format!(
                "Dry run completed. Would have terminated {} session(s) ({}).",
                self.would_terminate, counts
            )
        } else {
            format!(
                "Completed. Terminated {} session(s), {} failed, {} already ended ({}).",
                self.terminated, self.failed, self.already_ended, counts
            )
        }
    }

    /// Emit the summary through tracing
    pub fn log(&self) {
        if self.failed > 0 {
            tracing::warn!(
                terminated = self.terminated,
                failed = self.failed,
                "{}",
                self.headline()
            );
        } else {
            tracing::info!(
                terminated = self.terminated,
                would_terminate = self.would_terminate,
                "{}",
                self.headline()
            );
        }
    }

    /// Per-session outcome table
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.add_row(row!["Session", "User / Device", "Idle", "Outcome"]);

        for result in &self.results {
            let idle = result
                .idle_seconds
                .map(|s| format_duration(TimeDelta::seconds(s)))
                .unwrap_or_else(|| "unknown".to_string());
            let outcome = match &result.outcome {
                TerminationOutcome::Terminated => "terminated".to_string(),
                TerminationOutcome::AlreadyEnded => "already ended".to_string(),
                TerminationOutcome::DryRun => "would terminate".to_string(),
                TerminationOutcome::Failed { reason } => format!("failed: {}", reason),
            };
            table.add_row(row![result.session_id, result.label, idle, outcome]);
        }

        table
    }

    /// Pretty JSON rendering
    ///
    /// # Errors
    ///
    /// Returns `ReaperError::Serialization` if serialization fails
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ReaperError::Serialization(e).into())
    }

    /// Write the summary to stdout in the requested format
    ///
    /// # Errors
    ///
    /// Returns `ReaperError::Serialization` if JSON rendering fails
    pub fn print(&self, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Text => println!("{}", self),
            OutputFormat::Json => println!("{}", self.to_json()?),
        }
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.headline())?;
        writeln!(
            f,
            "Server: {}  Timeout: {} minutes",
            self.server, self.timeout_minutes
        )?;
        if !self.results.is_empty() {
            writeln!(f)?;
            write!(f, "{}", self.table())?;
        }
        Ok(())
    }
}
