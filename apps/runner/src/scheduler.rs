//! Backfill and recurring schedule for the runner.
//!
//! Each cycle schedules every logical date whose interval has closed and
//! drains the queue. Logical date D runs once D plus one interval has
//! arrived, so the feed has published D's bar by then.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

use dailybar_core::{RunCoordinator, RunReport, RunState};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Counts of one cycle's run results.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub loaded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Runs that ended without reaching a terminal state.
    pub interrupted: usize,
}

impl CycleSummary {
    pub fn from_reports(reports: &[RunReport]) -> Self {
        reports.iter().fold(Self::default(), |mut summary, report| {
            match report.state() {
                RunState::Succeeded if report.is_skip() => summary.skipped += 1,
                RunState::Succeeded => summary.loaded += 1,
                RunState::Failed => summary.failed += 1,
                _ => summary.interrupted += 1,
            }
            summary
        })
    }
}

/// Latest logical date whose interval has closed by `today`.
pub fn last_closed_date(today: NaiveDate, interval_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(interval_days.max(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// Schedule every closed logical date as of `today` and execute everything
/// pending.
pub async fn run_cycle(
    coordinator: &Arc<RunCoordinator>,
    today: NaiveDate,
) -> anyhow::Result<CycleSummary> {
    let through = last_closed_date(today, coordinator.config().schedule_interval_days);
    let queued = coordinator.schedule_through(through).await?;
    if queued.is_empty() {
        info!("Nothing new to run through {}", through);
    }

    let reports = coordinator.run_pending().await?;
    for report in &reports {
        report_run(report);
    }

    let summary = CycleSummary::from_reports(&reports);
    info!(
        "Cycle through {} finished: {} loaded, {} skipped, {} failed",
        through, summary.loaded, summary.skipped, summary.failed
    );
    Ok(summary)
}

fn report_run(report: &RunReport) {
    match report.state() {
        RunState::Succeeded if report.is_skip() => info!("No data: {}", report),
        RunState::Succeeded => info!("{}", report),
        RunState::Failed => {
            error!("{}", report);
            for attempt in &report.run.attempts {
                error!(
                    "  attempt {} failed in {}: {}",
                    attempt.attempt, attempt.stage, attempt.error
                );
            }
        }
        _ => warn!("{}", report),
    }
}

/// Run a cycle immediately, then again every `interval_days` until shutdown.
pub async fn run_forever(
    coordinator: Arc<RunCoordinator>,
    interval_days: u32,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let period = Duration::from_secs(SECS_PER_DAY * u64::from(interval_days.max(1)));
    let mut ticks = interval(period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Scheduler started ({}-day interval)", interval_days);

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                run_cycle(&coordinator, Utc::now().date_naive()).await?;
                if coordinator.is_cancelled() {
                    break;
                }
            }
            Ok(()) = shutdown.changed() => break,
        }
    }

    info!("Scheduler stopped");
    Ok(())
}
