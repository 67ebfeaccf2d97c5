//! Run coordination.
//!
//! The [`RunCoordinator`] owns every piece of run bookkeeping: the queue of
//! scheduled logical dates, the runs themselves and the concurrency slots.
//! A run executes its stages strictly in order:
//!
//! ```text
//! InitStore -> Fetch -> Transform -> Load
//! ```
//!
//! A failed attempt resumes from the stage that failed; outputs of completed
//! stages are kept for the lifetime of the run.
//!
//! Cancellation leaves a run `Interrupted`. That state is archived but not
//! terminal, so the next backfill schedules the date again.

use chrono::NaiveDate;
use log::{debug, error, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use dailybar_feed::{FeedFetcher, RawFeedRecord};

use super::model::{LogicalDateRun, RunReport, RunState, TaskStage};
use super::schedule::logical_dates;
use super::store::RunStore;
use crate::config::{FetchRetryPolicy, PipelineConfig};
use crate::errors::{Error, Result};
use crate::records::{
    LoadReport, MarketDataLoader, MarketDataRecord, MarketDataStore, SchemaInitializer,
    SchemaReady, SchemaStatus, StoreInitializer, Transformer,
};

/// External collaborators of a pipeline.
#[derive(Clone)]
pub struct PipelineComponents {
    pub fetcher: Arc<dyn FeedFetcher>,
    pub schema: Arc<dyn SchemaInitializer>,
    pub records: Arc<dyn MarketDataStore>,
    pub runs: Arc<dyn RunStore>,
}

struct StageFailure {
    stage: TaskStage,
    error: Error,
}

/// Outputs of completed stages, kept across attempts of one run.
#[derive(Default)]
struct StageOutputs {
    ready: Option<SchemaReady>,
    raw: Option<RawFeedRecord>,
    record: Option<MarketDataRecord>,
}

#[derive(Default)]
struct CoordinatorState {
    queue: BTreeSet<NaiveDate>,
    runs: BTreeMap<NaiveDate, LogicalDateRun>,
}

/// Counts a run as active for as long as it lives.
struct ActiveGuard<'a> {
    active: &'a AtomicUsize,
}

impl<'a> ActiveGuard<'a> {
    fn enter(active: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { active }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct RunCoordinator {
    config: PipelineConfig,
    fetcher: Arc<dyn FeedFetcher>,
    transformer: Transformer,
    initializer: StoreInitializer,
    loader: MarketDataLoader,
    history: Arc<dyn RunStore>,
    state: Mutex<CoordinatorState>,
    slots: Arc<Semaphore>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
    cancelled: AtomicBool,
    cancel_notify: Notify,
}

impl RunCoordinator {
    pub fn new(config: PipelineConfig, components: PipelineComponents) -> Result<Arc<Self>> {
        config.validate()?;
        info!(
            "Pipeline for {} from {} (max_active_runs={}, retry_limit={}, retry_delay={:?}, conflict_policy={}, fetch_retry_policy={}, feed={})",
            config.symbol,
            config.start_date,
            config.max_active_runs,
            config.retry_limit,
            config.retry_delay,
            config.conflict_policy,
            config.fetch_retry_policy,
            components.fetcher.id()
        );
        Ok(Arc::new(Self {
            transformer: Transformer::new(config.symbol.clone()),
            initializer: StoreInitializer::new(components.schema),
            loader: MarketDataLoader::new(components.records, config.conflict_policy),
            fetcher: components.fetcher,
            history: components.runs,
            state: Mutex::new(CoordinatorState::default()),
            slots: Arc::new(Semaphore::new(config.max_active_runs)),
            active: AtomicUsize::new(0),
            peak_active: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            cancel_notify: Notify::new(),
            config,
        }))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    /// Schedule one logical date.
    ///
    /// Returns `false` when the date is already queued, has a run in this
    /// coordinator that was not interrupted, or is archived as terminal.
    pub async fn enqueue(&self, date: NaiveDate) -> Result<bool> {
        let mut state = self.state.lock().await;
        self.enqueue_locked(&mut state, date)
    }

    /// Schedule every logical date from the start date through `end`.
    ///
    /// Returns the dates that were newly queued, oldest first.
    pub async fn schedule_through(&self, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let dates = logical_dates(
            self.config.start_date,
            end,
            self.config.schedule_interval_days,
        );
        let mut state = self.state.lock().await;
        let mut queued = Vec::new();
        for date in &dates {
            if self.enqueue_locked(&mut state, *date)? {
                queued.push(*date);
            }
        }
        info!(
            "Scheduled {} of {} logical dates from {} through {}",
            queued.len(),
            dates.len(),
            self.config.start_date,
            end
        );
        Ok(queued)
    }

    /// Drop the run recorded for `date` and schedule it again.
    pub async fn rerun(&self, date: NaiveDate) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.queue.contains(&date) {
            debug!("{} {} is already queued", self.config.symbol, date);
            return Ok(());
        }
        if matches!(state.runs.get(&date), Some(run) if !run.state.is_settled()) {
            return Err(Error::RunInProgress(date));
        }

        state.runs.remove(&date);
        if self.history.delete_run(&self.config.symbol, date).await? {
            debug!("Removed archived run for {} {}", self.config.symbol, date);
        }
        state
            .runs
            .insert(date, LogicalDateRun::new(self.config.symbol.clone(), date));
        state.queue.insert(date);
        info!("Cleared {} {}; queued for rerun", self.config.symbol, date);
        Ok(())
    }

    fn enqueue_locked(&self, state: &mut CoordinatorState, date: NaiveDate) -> Result<bool> {
        let known = state
            .runs
            .get(&date)
            .is_some_and(|run| run.state != RunState::Interrupted);
        if state.queue.contains(&date) || known {
            return Ok(false);
        }
        if let Some(archived) = self.history.get_run(&self.config.symbol, date)? {
            if archived.is_terminal() {
                debug!(
                    "{} {} already archived as {}",
                    self.config.symbol, date, archived.state
                );
                return Ok(false);
            }
        }
        state
            .runs
            .insert(date, LogicalDateRun::new(self.config.symbol.clone(), date));
        state.queue.insert(date);
        Ok(true)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute the oldest queued date, if any.
    pub async fn run_next(&self) -> Result<Option<RunReport>> {
        let permit = self.acquire_slot().await?;
        if self.is_cancelled() {
            return Ok(None);
        }
        let Some(date) = self.claim_next().await else {
            return Ok(None);
        };
        Ok(Some(self.execute(date, permit).await))
    }

    /// Drain the queue oldest first, with at most `max_active_runs` runs at once.
    ///
    /// Reports come back in logical-date order. After [`cancel`](Self::cancel)
    /// no further dates are started; they stay queued as `Pending`.
    pub async fn run_pending(self: &Arc<Self>) -> Result<Vec<RunReport>> {
        let mut tasks = JoinSet::new();
        loop {
            let permit = self.acquire_slot().await?;
            if self.is_cancelled() {
                info!("Cancellation requested; not starting further runs");
                break;
            }
            let Some(date) = self.claim_next().await else {
                break;
            };
            let this = Arc::clone(self);
            tasks.spawn(async move { this.execute(date, permit).await });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let report =
                joined.map_err(|e| Error::Unexpected(format!("run task failed: {}", e)))?;
            reports.push(report);
        }
        reports.sort_by_key(RunReport::logical_date);
        Ok(reports)
    }

    async fn acquire_slot(&self) -> Result<OwnedSemaphorePermit> {
        Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| Error::Unexpected(format!("run slots closed: {}", e)))
    }

    async fn claim_next(&self) -> Option<NaiveDate> {
        self.state.lock().await.queue.pop_first()
    }

    /// Run one logical date to a terminal state. The permit is held throughout.
    async fn execute(&self, date: NaiveDate, _slot: OwnedSemaphorePermit) -> RunReport {
        let _active = ActiveGuard::enter(&self.active, &self.peak_active);
        let symbol = self.config.symbol.as_str();
        let mut outputs = StageOutputs::default();

        loop {
            if self.is_cancelled() {
                return self
                    .interrupt(date, "Run cancelled before next attempt".to_string())
                    .await;
            }

            let (attempt, run) = self.update_run(date, |run| run.start_attempt()).await;
            info!("Run {} {} attempt {} started", symbol, date, attempt);
            if attempt == 1 {
                self.archive(&run).await;
            }

            match self.attempt(date, &mut outputs).await {
                Ok(load) => {
                    let (_, run) = self.update_run(date, |run| run.succeed(&load)).await;
                    if load.outcome.is_skip() {
                        info!("Run succeeded with skip: {}", run.summary());
                    } else {
                        info!("Run succeeded: {}", run.summary());
                    }
                    self.archive(&run).await;
                    return RunReport {
                        run,
                        load: Some(load),
                    };
                }
                Err(StageFailure {
                    error: error @ Error::Cancelled(_),
                    ..
                }) => {
                    return self.interrupt(date, error.to_string()).await;
                }
                Err(StageFailure { stage, error }) => {
                    let retryable = self.is_retryable(&error);
                    let will_retry = retryable && attempt <= self.config.retry_limit;
                    let (_, run) = self
                        .update_run(date, |run| {
                            run.record_failure(stage, &error, retryable, will_retry)
                        })
                        .await;

                    if !will_retry {
                        error!(
                            "Run {} {} failed at stage {} after {} attempt(s): {}",
                            symbol, date, stage, attempt, error
                        );
                        self.archive(&run).await;
                        return RunReport { run, load: None };
                    }

                    warn!(
                        "Run {} {} attempt {} failed at stage {}: {}; retrying in {:?}",
                        symbol, date, attempt, stage, error, self.config.retry_delay
                    );
                    self.wait_retry_delay().await;
                }
            }
        }
    }

    async fn interrupt(&self, date: NaiveDate, reason: String) -> RunReport {
        let (_, run) = self.update_run(date, |run| run.interrupt(reason)).await;
        warn!(
            "Run {} {} interrupted after {} attempt(s); it will be scheduled again",
            run.symbol, date, run.attempt_count
        );
        self.archive(&run).await;
        RunReport { run, load: None }
    }

    /// One attempt, resuming after the last completed stage.
    async fn attempt(
        &self,
        date: NaiveDate,
        outputs: &mut StageOutputs,
    ) -> std::result::Result<LoadReport, StageFailure> {
        let ready = match outputs.ready {
            Some(ready) => ready,
            None => {
                let ready = self
                    .stage(TaskStage::InitStore, self.initializer.ensure())
                    .await?;
                outputs.ready = Some(ready);
                ready
            }
        };

        let record = match outputs.record.clone() {
            Some(record) => record,
            None => {
                let raw = match outputs.raw.clone() {
                    Some(raw) => raw,
                    None => {
                        let raw = self
                            .stage(TaskStage::Fetch, async {
                                self.fetcher
                                    .fetch(&self.config.symbol, date)
                                    .await
                                    .map_err(Error::from)
                            })
                            .await?;
                        outputs.raw = Some(raw.clone());
                        raw
                    }
                };
                let record = self
                    .stage(TaskStage::Transform, async {
                        self.transformer.transform(&raw, date).map_err(Error::from)
                    })
                    .await?;
                outputs.record = Some(record.clone());
                record
            }
        };

        self.stage(TaskStage::Load, self.loader.load(ready, &record))
            .await
    }

    /// Run a stage, honoring cancellation at its start and the stage timeout.
    ///
    /// `Load` is exempt from the timeout: its write is queued on the store's
    /// writer and commits even if this future is dropped.
    async fn stage<T, F>(&self, stage: TaskStage, work: F) -> std::result::Result<T, StageFailure>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(StageFailure {
                stage,
                error: Error::Cancelled(stage.to_string()),
            });
        }
        debug!("Stage {} started", stage);

        let limit = self.config.stage_timeout.filter(|_| stage != TaskStage::Load);
        let result = match limit {
            Some(limit) => match tokio::time::timeout(limit, work).await {
                Ok(result) => result,
                Err(_) => Err(Error::StageTimeout {
                    stage: stage.to_string(),
                    seconds: limit.as_secs(),
                }),
            },
            None => work.await,
        };
        result.map_err(|error| StageFailure { stage, error })
    }

    fn is_retryable(&self, error: &Error) -> bool {
        match (error, self.config.fetch_retry_policy) {
            (Error::Feed(_), FetchRetryPolicy::All) => true,
            _ => error.retry_class().is_retryable(),
        }
    }

    /// Sleep out the retry delay; a cancellation cuts it short.
    async fn wait_retry_delay(&self) {
        let notified = self.cancel_notify.notified();
        if self.is_cancelled() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.config.retry_delay) => {}
            _ = notified => {}
        }
    }

    async fn update_run<R>(
        &self,
        date: NaiveDate,
        change: impl FnOnce(&mut LogicalDateRun) -> R,
    ) -> (R, LogicalDateRun) {
        let mut state = self.state.lock().await;
        let run = state
            .runs
            .entry(date)
            .or_insert_with(|| LogicalDateRun::new(self.config.symbol.clone(), date));
        let result = change(run);
        (result, run.clone())
    }

    async fn archive(&self, run: &LogicalDateRun) {
        if let Err(e) = self.history.save_run(run).await {
            warn!(
                "Failed to archive run {} {} ({}): {}",
                run.symbol, run.logical_date, run.state, e
            );
        }
    }

    // =========================================================================
    // Observation and control
    // =========================================================================

    /// Current state of the run for `date`, falling back to the archive.
    pub async fn observe(&self, date: NaiveDate) -> Result<Option<LogicalDateRun>> {
        if let Some(run) = self.state.lock().await.runs.get(&date) {
            return Ok(Some(run.clone()));
        }
        self.history.get_run(&self.config.symbol, date)
    }

    /// Runs known to this coordinator, oldest logical date first.
    pub async fn runs(&self) -> Vec<LogicalDateRun> {
        self.state.lock().await.runs.values().cloned().collect()
    }

    /// Archived runs for the configured symbol.
    pub fn history(&self) -> Result<Vec<LogicalDateRun>> {
        self.history.list_runs(&self.config.symbol)
    }

    pub async fn pending_dates(&self) -> Vec<NaiveDate> {
        self.state.lock().await.queue.iter().copied().collect()
    }

    pub fn active_run_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously active runs seen so far.
    pub fn peak_active_runs(&self) -> usize {
        self.peak_active.load(Ordering::SeqCst)
    }

    pub fn schema_status(&self) -> Option<SchemaStatus> {
        self.initializer.status()
    }

    /// Create the store schema ahead of the first run.
    ///
    /// Runs do this themselves in `InitStore`; calling it up front lets run
    /// history be read before anything is scheduled.
    pub async fn initialize_store(&self) -> Result<SchemaStatus> {
        self.initializer.ensure().await?;
        self.initializer
            .status()
            .ok_or_else(|| Error::Unexpected("schema status missing after init".into()))
    }

    /// The full `market_data` table.
    pub fn table(&self) -> Result<Vec<MarketDataRecord>> {
        self.loader.table()
    }

    /// Stop at the next stage boundary. In-flight stages are not interrupted.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("Cancellation requested for {}", self.config.symbol);
        }
        self.cancel_notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
