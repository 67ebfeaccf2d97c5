//! Run bookkeeping models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::records::{LoadOutcome, LoadReport};

/// Lifecycle of one logical-date run.
///
/// `Pending -> Running -> {Succeeded | Retrying -> Running | Failed}`
///
/// A cancelled run stops in `Interrupted`, which is not terminal: the next
/// backfill schedules its date again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    #[default]
    Pending,
    Running,
    /// Waiting out the retry delay before the next attempt.
    Retrying,
    Succeeded,
    Failed,
    /// Stopped by cancellation before reaching a terminal state.
    Interrupted,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// No attempt is running or waiting to run.
    pub fn is_settled(self) -> bool {
        self.is_terminal() || self == Self::Interrupted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Retrying => "RETRYING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Interrupted => "INTERRUPTED",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "RETRYING" => Ok(Self::Retrying),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "INTERRUPTED" => Ok(Self::Interrupted),
            other => Err(Error::Unexpected(format!("unknown run state '{}'", other))),
        }
    }
}

/// The stages of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    InitStore,
    Fetch,
    Transform,
    Load,
}

impl TaskStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitStore => "init_store",
            Self::Fetch => "fetch",
            Self::Transform => "transform",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for TaskStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a succeeded run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    /// A row was written (inserted or replaced).
    Loaded,
    /// The row for this date was already stored and kept.
    AlreadyPresent,
    /// The feed had no data for this date.
    Skipped { status: String },
}

impl From<&LoadOutcome> for RunOutcome {
    fn from(outcome: &LoadOutcome) -> Self {
        match outcome {
            LoadOutcome::Inserted | LoadOutcome::Replaced => Self::Loaded,
            LoadOutcome::AlreadyPresent => Self::AlreadyPresent,
            LoadOutcome::Skipped { status } => Self::Skipped {
                status: status.clone(),
            },
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::AlreadyPresent => write!(f, "already present"),
            Self::Skipped { status } => write!(f, "skipped, status {}", status),
        }
    }
}

/// One failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub attempt: u32,
    pub stage: TaskStage,
    pub error: String,
    /// Whether the error class allowed another attempt.
    pub retryable: bool,
    pub at: DateTime<Utc>,
}

/// One scheduled execution of the pipeline for a logical date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalDateRun {
    pub run_id: String,
    pub symbol: String,
    pub logical_date: NaiveDate,
    pub state: RunState,
    /// Attempts started so far, including the one in progress.
    pub attempt_count: u32,
    pub attempts: Vec<AttemptRecord>,
    pub outcome: Option<RunOutcome>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogicalDateRun {
    pub fn new(symbol: impl Into<String>, logical_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::now_v7().to_string(),
            symbol: symbol.into(),
            logical_date,
            state: RunState::Pending,
            attempt_count: 0,
            attempts: Vec::new(),
            outcome: None,
            last_error: None,
            started_at: None,
            finished_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Enter `Running` for a new attempt and return its number.
    pub fn start_attempt(&mut self) -> u32 {
        let now = Utc::now();
        self.attempt_count += 1;
        self.state = RunState::Running;
        self.started_at.get_or_insert(now);
        self.updated_at = now;
        self.attempt_count
    }

    /// Record the failure of the current attempt.
    ///
    /// Moves to `Retrying` when `will_retry`, otherwise to `Failed`.
    pub fn record_failure(&mut self, stage: TaskStage, error: &Error, retryable: bool, will_retry: bool) {
        let now = Utc::now();
        let message = error.to_string();
        self.attempts.push(AttemptRecord {
            attempt: self.attempt_count,
            stage,
            error: message.clone(),
            retryable,
            at: now,
        });
        self.last_error = Some(message);
        self.updated_at = now;
        if will_retry {
            self.state = RunState::Retrying;
        } else {
            self.state = RunState::Failed;
            self.finished_at = Some(now);
        }
    }

    pub fn succeed(&mut self, report: &LoadReport) {
        let now = Utc::now();
        self.state = RunState::Succeeded;
        self.outcome = Some(RunOutcome::from(&report.outcome));
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    /// Stop the run on cancellation, leaving it schedulable again.
    ///
    /// The attempt that was cut short is not counted as a failure.
    pub fn interrupt(&mut self, reason: impl Into<String>) {
        self.state = RunState::Interrupted;
        self.last_error = Some(reason.into());
        self.finished_at = None;
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Succeeded without data for the date.
    pub fn is_skip(&self) -> bool {
        self.state == RunState::Succeeded && matches!(self.outcome, Some(RunOutcome::Skipped { .. }))
    }

    /// One-line operator summary.
    pub fn summary(&self) -> String {
        let attempts = match self.attempt_count {
            1 => "1 attempt".to_string(),
            n => format!("{} attempts", n),
        };
        match (&self.state, &self.outcome, &self.last_error) {
            (RunState::Succeeded, Some(outcome), _) => format!(
                "{} {}: {} ({}) after {}",
                self.symbol, self.logical_date, self.state, outcome, attempts
            ),
            (RunState::Failed, _, Some(error)) => format!(
                "{} {}: {} after {}: {}",
                self.symbol, self.logical_date, self.state, attempts, error
            ),
            _ => format!(
                "{} {}: {} after {}",
                self.symbol, self.logical_date, self.state, attempts
            ),
        }
    }
}

/// Result of executing one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: LogicalDateRun,
    /// Present when the load stage completed.
    pub load: Option<LoadReport>,
}

impl RunReport {
    pub fn logical_date(&self) -> NaiveDate {
        self.run.logical_date
    }

    pub fn state(&self) -> RunState {
        self.run.state
    }

    pub fn succeeded(&self) -> bool {
        self.run.state == RunState::Succeeded
    }

    pub fn is_skip(&self) -> bool {
        self.run.is_skip()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.run.summary())
    }
}
