use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chrono::NaiveDate;

use dailybar_core::config::{
    DEFAULT_MAX_ACTIVE_RUNS, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_LIMIT,
    DEFAULT_SCHEDULE_INTERVAL_DAYS, DEFAULT_STAGE_TIMEOUT, DEFAULT_SYMBOL,
};
use dailybar_core::{ConflictPolicy, FetchRetryPolicy, PipelineConfig};
use dailybar_feed::provider::polygon::DEFAULT_BASE_URL;
use dailybar_storage_sqlite::DEFAULT_DB_PATH;

pub struct Config {
    pub db_path: String,
    pub feed_base_url: String,
    /// Drain the backfill once and exit instead of scheduling daily runs.
    pub run_once: bool,
    pub pipeline: PipelineConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let defaults = PipelineConfig::default();
        let start_date = match var("DAILYBAR_START_DATE") {
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .with_context(|| format!("Invalid DAILYBAR_START_DATE '{}'", raw))?,
            None => defaults.start_date,
        };
        let stage_timeout_secs: u64 = parse(
            &var,
            "DAILYBAR_STAGE_TIMEOUT_SECS",
            DEFAULT_STAGE_TIMEOUT.as_secs(),
        )?;
        let conflict_policy = match var("DAILYBAR_CONFLICT_POLICY") {
            Some(raw) => ConflictPolicy::from_str(&raw)?,
            None => ConflictPolicy::default(),
        };
        let fetch_retry_policy = match var("DAILYBAR_FETCH_RETRY_POLICY") {
            Some(raw) => FetchRetryPolicy::from_str(&raw)?,
            None => FetchRetryPolicy::default(),
        };

        let pipeline = PipelineConfig {
            symbol: var("DAILYBAR_SYMBOL")
                .map(|s| s.trim().to_ascii_uppercase())
                .unwrap_or_else(|| DEFAULT_SYMBOL.to_string()),
            start_date,
            schedule_interval_days: parse(
                &var,
                "DAILYBAR_SCHEDULE_INTERVAL_DAYS",
                DEFAULT_SCHEDULE_INTERVAL_DAYS,
            )?,
            retry_limit: parse(&var, "DAILYBAR_RETRY_LIMIT", DEFAULT_RETRY_LIMIT)?,
            retry_delay: Duration::from_secs(parse(
                &var,
                "DAILYBAR_RETRY_DELAY_SECS",
                DEFAULT_RETRY_DELAY.as_secs(),
            )?),
            max_active_runs: parse(&var, "DAILYBAR_MAX_ACTIVE_RUNS", DEFAULT_MAX_ACTIVE_RUNS)?,
            stage_timeout: (stage_timeout_secs > 0).then(|| Duration::from_secs(stage_timeout_secs)),
            conflict_policy,
            fetch_retry_policy,
        };
        pipeline.validate()?;

        Ok(Self {
            db_path: var("DAILYBAR_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            feed_base_url: var("DAILYBAR_FEED_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            run_once: parse_flag(&var, "DAILYBAR_RUN_ONCE")?,
            pipeline,
        })
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {} '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_flag(var: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<bool> {
    match var(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("Invalid {} '{}': expected true or false", key, v)),
        },
    }
}
