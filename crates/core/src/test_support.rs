//! In-memory collaborators shared by the unit tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dailybar_feed::{FeedError, FeedFetcher, RawFeedRecord};

use crate::config::ConflictPolicy;
use crate::errors::{DatabaseError, Error, Result};
use crate::records::{MarketDataRecord, MarketDataStore, SchemaInitializer, SchemaStatus, WriteOutcome};
use crate::runs::{LogicalDateRun, RunStore};

// =========================================================================
// Schema
// =========================================================================

#[derive(Default)]
pub struct MockSchema {
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    created: AtomicBool,
}

impl MockSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` calls.
    pub fn failing(n: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(n),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaInitializer for MockSchema {
    async fn ensure_schema(&self) -> Result<SchemaStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Database(DatabaseError::MigrationFailed(
                "database is locked".into(),
            )));
        }
        if self.created.swap(true, Ordering::SeqCst) {
            Ok(SchemaStatus::AlreadyPresent)
        } else {
            Ok(SchemaStatus::Created)
        }
    }
}

// =========================================================================
// Market data store
// =========================================================================

#[derive(Default)]
pub struct MockMarketStore {
    rows: Mutex<Vec<MarketDataRecord>>,
    failures_left: AtomicUsize,
    insert_calls: AtomicUsize,
    insert_delay: Mutex<Option<Duration>>,
}

impl MockMarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` inserts fail as if the store were unreachable.
    pub fn fail_next_inserts(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Sleep this long inside every insert.
    pub fn delay_inserts(&self, delay: Duration) {
        *self.insert_delay.lock().unwrap() = Some(delay);
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn rows(&self) -> Vec<MarketDataRecord> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataStore for MockMarketStore {
    async fn insert_record(
        &self,
        record: &MarketDataRecord,
        policy: ConflictPolicy,
    ) -> Result<WriteOutcome> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Database(DatabaseError::ConnectionFailed(
                "unable to open database file".into(),
            )));
        }

        let mut rows = self.rows.lock().unwrap();
        match rows.iter().position(|row| row.key() == record.key()) {
            None => {
                rows.push(record.clone());
                Ok(WriteOutcome::Inserted)
            }
            Some(_) if policy == ConflictPolicy::Reject => Ok(WriteOutcome::AlreadyPresent),
            Some(index) => {
                rows[index] = record.clone();
                Ok(WriteOutcome::Replaced)
            }
        }
    }

    fn list_records(&self) -> Result<Vec<MarketDataRecord>> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.symbol.cmp(&b.symbol)));
        Ok(rows)
    }

    fn count_records(&self) -> Result<usize> {
        Ok(self.rows.lock().unwrap().len())
    }
}

// =========================================================================
// Run history
// =========================================================================

#[derive(Default)]
pub struct MockRunStore {
    runs: Mutex<HashMap<(String, NaiveDate), LogicalDateRun>>,
    saves: AtomicUsize,
}

impl MockRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runs(runs: Vec<LogicalDateRun>) -> Self {
        let store = Self::new();
        {
            let mut map = store.runs.lock().unwrap();
            for run in runs {
                map.insert((run.symbol.clone(), run.logical_date), run);
            }
        }
        store
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RunStore for MockRunStore {
    async fn save_run(&self, run: &LogicalDateRun) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.runs
            .lock()
            .unwrap()
            .insert((run.symbol.clone(), run.logical_date), run.clone());
        Ok(())
    }

    fn get_run(&self, symbol: &str, logical_date: NaiveDate) -> Result<Option<LogicalDateRun>> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), logical_date))
            .cloned())
    }

    fn list_runs(&self, symbol: &str) -> Result<Vec<LogicalDateRun>> {
        let mut runs: Vec<_> = self
            .runs
            .lock()
            .unwrap()
            .values()
            .filter(|run| run.symbol == symbol)
            .cloned()
            .collect();
        runs.sort_by_key(|run| run.logical_date);
        Ok(runs)
    }

    async fn delete_run(&self, symbol: &str, logical_date: NaiveDate) -> Result<bool> {
        Ok(self
            .runs
            .lock()
            .unwrap()
            .remove(&(symbol.to_string(), logical_date))
            .is_some())
    }
}

// =========================================================================
// Feed
// =========================================================================

/// One scripted fetch response.
#[derive(Clone, Debug)]
pub enum Step {
    Ok(RawFeedRecord),
    /// Connection-level failure, retried by default.
    Transient,
    /// Unknown symbol, never retried by default.
    Permanent,
}

/// A payload the transformer maps onto a full OK record.
pub fn ok_payload(date: NaiveDate, close: f64) -> RawFeedRecord {
    serde_json::from_value(json!({
        "status": "OK",
        "from": date.format("%Y-%m-%d").to_string(),
        "symbol": "AMZN",
        "open": close - 1.0,
        "high": close + 2.0,
        "low": close - 2.0,
        "close": close,
        "volume": 1_000_000,
    }))
    .unwrap()
}

pub fn status_payload(status: &str) -> RawFeedRecord {
    serde_json::from_value(json!({ "status": status })).unwrap()
}

/// Fetcher that replays scripted steps per logical date.
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<NaiveDate, VecDeque<Step>>>,
    default_close: f64,
    delay: Option<Duration>,
    calls: Mutex<Vec<NaiveDate>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    /// Every unscripted call returns an OK payload.
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default_close: 100.50,
            delay: None,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn script(self, date: NaiveDate, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().insert(date, steps.into());
        self
    }

    pub fn calls(&self) -> Vec<NaiveDate> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, date: NaiveDate) -> usize {
        self.calls.lock().unwrap().iter().filter(|d| **d == date).count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedFetcher for ScriptedFetcher {
    fn id(&self) -> &'static str {
        "SCRIPTED"
    }

    async fn fetch(&self, symbol: &str, date: NaiveDate) -> std::result::Result<RawFeedRecord, FeedError> {
        self.calls.lock().unwrap().push(date);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&date)
            .and_then(VecDeque::pop_front);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match step {
            None => Ok(ok_payload(date, self.default_close)),
            Some(Step::Ok(raw)) => Ok(raw),
            Some(Step::Transient) => Err(FeedError::Timeout {
                provider: self.id().to_string(),
            }),
            Some(Step::Permanent) => Err(FeedError::SymbolNotFound(symbol.to_string())),
        }
    }
}
