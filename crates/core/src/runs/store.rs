use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::LogicalDateRun;
use crate::errors::Result;

/// Persistence for run history, keyed by (symbol, logical date).
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert or replace the run for its (symbol, logical date).
    async fn save_run(&self, run: &LogicalDateRun) -> Result<()>;

    fn get_run(&self, symbol: &str, logical_date: NaiveDate) -> Result<Option<LogicalDateRun>>;

    /// Runs for `symbol`, oldest logical date first.
    fn list_runs(&self, symbol: &str) -> Result<Vec<LogicalDateRun>>;

    /// Returns whether a run was removed.
    async fn delete_run(&self, symbol: &str, logical_date: NaiveDate) -> Result<bool>;
}
