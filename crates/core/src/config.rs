//! Pipeline configuration.
//!
//! Values default to the original daily schedule: one instrument, backfill
//! from 2025-01-01, three retries five minutes apart, one active run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{Error, Result};

pub const DEFAULT_SYMBOL: &str = "AMZN";
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_ACTIVE_RUNS: usize = 1;
pub const DEFAULT_SCHEDULE_INTERVAL_DAYS: u32 = 1;
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(120);

/// What the loader does when a row for the same (date, symbol) already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Keep the stored row and report `AlreadyPresent`.
    #[default]
    Reject,
    /// Replace the stored row with the new one.
    Overwrite,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reject => write!(f, "reject"),
            Self::Overwrite => write!(f, "overwrite"),
        }
    }
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "overwrite" => Ok(Self::Overwrite),
            other => Err(Error::InvalidConfigValue(format!(
                "conflict policy must be 'reject' or 'overwrite', got '{}'",
                other
            ))),
        }
    }
}

/// Which fetch failures consume retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchRetryPolicy {
    /// Retry transient failures only; permanent ones fail the run at once.
    #[default]
    TransientOnly,
    /// Retry every fetch failure regardless of its class.
    All,
}

impl fmt::Display for FetchRetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransientOnly => write!(f, "transient-only"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for FetchRetryPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transient-only" | "transient" => Ok(Self::TransientOnly),
            "all" => Ok(Self::All),
            other => Err(Error::InvalidConfigValue(format!(
                "fetch retry policy must be 'transient-only' or 'all', got '{}'",
                other
            ))),
        }
    }
}

/// Settings for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Instrument fetched and stored by this pipeline.
    pub symbol: String,
    /// First logical date of the backfill range.
    pub start_date: NaiveDate,
    /// Days between consecutive logical dates.
    pub schedule_interval_days: u32,
    /// Retries after the first attempt before a run fails.
    pub retry_limit: u32,
    /// Fixed wait between attempts.
    pub retry_delay: Duration,
    /// Runs allowed in Running state at the same time.
    pub max_active_runs: usize,
    /// Upper bound for a single stage; `None` disables it.
    pub stage_timeout: Option<Duration>,
    pub conflict_policy: ConflictPolicy,
    pub fetch_retry_policy: FetchRetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            schedule_interval_days: DEFAULT_SCHEDULE_INTERVAL_DAYS,
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_active_runs: DEFAULT_MAX_ACTIVE_RUNS,
            stage_timeout: Some(DEFAULT_STAGE_TIMEOUT),
            conflict_policy: ConflictPolicy::default(),
            fetch_retry_policy: FetchRetryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Check the values the coordinator cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(Error::MissingConfigKey("symbol".to_string()));
        }
        if self.max_active_runs == 0 {
            return Err(Error::InvalidConfigValue(
                "max_active_runs must be at least 1".to_string(),
            ));
        }
        if self.schedule_interval_days == 0 {
            return Err(Error::InvalidConfigValue(
                "schedule_interval_days must be at least 1".to_string(),
            ));
        }
        if matches!(self.stage_timeout, Some(limit) if limit.is_zero()) {
            return Err(Error::InvalidConfigValue(
                "stage_timeout must be positive; use None to disable it".to_string(),
            ));
        }
        Ok(())
    }
}
