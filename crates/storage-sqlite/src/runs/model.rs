//! Database model for archived pipeline runs.

use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;

use crate::errors::StorageError;
use dailybar_core::runs::{LogicalDateRun, RunState};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::pipeline_runs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct PipelineRunDB {
    pub run_id: String,
    pub symbol: String,
    pub logical_date: String,
    pub state: String,
    pub attempt_count: i32,
    /// JSON array of attempt records.
    pub attempts: String,
    /// JSON outcome object.
    pub outcome: Option<String>,
    pub last_error: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::Corrupt(format!("{} = '{}'", column, value)))
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    value.map(|v| parse_timestamp(column, v)).transpose()
}

impl TryFrom<&LogicalDateRun> for PipelineRunDB {
    type Error = StorageError;

    fn try_from(run: &LogicalDateRun) -> Result<Self, Self::Error> {
        Ok(Self {
            run_id: run.run_id.clone(),
            symbol: run.symbol.clone(),
            logical_date: run.logical_date.format(DATE_FORMAT).to_string(),
            state: run.state.as_str().to_string(),
            attempt_count: i32::try_from(run.attempt_count)
                .map_err(|_| StorageError::SerializationError("attempt_count overflow".into()))?,
            attempts: serde_json::to_string(&run.attempts)?,
            outcome: run.outcome.as_ref().map(serde_json::to_string).transpose()?,
            last_error: run.last_error.clone(),
            started_at: run.started_at.map(|t| t.to_rfc3339()),
            finished_at: run.finished_at.map(|t| t.to_rfc3339()),
            created_at: run.created_at.to_rfc3339(),
            updated_at: run.updated_at.to_rfc3339(),
        })
    }
}

impl TryFrom<PipelineRunDB> for LogicalDateRun {
    type Error = StorageError;

    fn try_from(row: PipelineRunDB) -> Result<Self, Self::Error> {
        let logical_date = NaiveDate::parse_from_str(&row.logical_date, DATE_FORMAT)
            .map_err(|_| StorageError::Corrupt(format!("logical_date = '{}'", row.logical_date)))?;
        let state = row
            .state
            .parse::<RunState>()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        Ok(LogicalDateRun {
            run_id: row.run_id,
            symbol: row.symbol,
            logical_date,
            state,
            attempt_count: u32::try_from(row.attempt_count).unwrap_or_default(),
            attempts: serde_json::from_str(&row.attempts)?,
            outcome: row.outcome.as_deref().map(serde_json::from_str).transpose()?,
            last_error: row.last_error,
            started_at: parse_optional_timestamp("started_at", row.started_at.as_deref())?,
            finished_at: parse_optional_timestamp("finished_at", row.finished_at.as_deref())?,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            updated_at: parse_timestamp("updated_at", &row.updated_at)?,
        })
    }
}
