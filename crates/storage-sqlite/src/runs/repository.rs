//! Repository for run history persistence.

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use dailybar_core::errors::Result;
use dailybar_core::runs::{LogicalDateRun, RunStore};

use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::pipeline_runs;

use super::model::{PipelineRunDB, DATE_FORMAT};

pub struct RunRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl RunRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl RunStore for RunRepository {
    async fn save_run(&self, run: &LogicalDateRun) -> Result<()> {
        let db_model = PipelineRunDB::try_from(run).into_core()?;

        self.writer
            .exec(move |conn| {
                diesel::replace_into(pipeline_runs::table)
                    .values(&db_model)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn get_run(&self, symbol: &str, logical_date: NaiveDate) -> Result<Option<LogicalDateRun>> {
        let mut conn = get_connection(&self.pool)?;

        let row = pipeline_runs::table
            .filter(pipeline_runs::symbol.eq(symbol))
            .filter(pipeline_runs::logical_date.eq(logical_date.format(DATE_FORMAT).to_string()))
            .select(PipelineRunDB::as_select())
            .first::<PipelineRunDB>(&mut conn)
            .optional()
            .into_core()?;

        row.map(LogicalDateRun::try_from).transpose().into_core()
    }

    fn list_runs(&self, symbol: &str) -> Result<Vec<LogicalDateRun>> {
        let mut conn = get_connection(&self.pool)?;

        pipeline_runs::table
            .filter(pipeline_runs::symbol.eq(symbol))
            .order(pipeline_runs::logical_date.asc())
            .select(PipelineRunDB::as_select())
            .load::<PipelineRunDB>(&mut conn)
            .into_core()?
            .into_iter()
            .map(LogicalDateRun::try_from)
            .collect::<std::result::Result<Vec<_>, StorageError>>()
            .into_core()
    }

    async fn delete_run(&self, symbol: &str, logical_date: NaiveDate) -> Result<bool> {
        let symbol = symbol.to_string();
        let date = logical_date.format(DATE_FORMAT).to_string();

        self.writer
            .exec(move |conn| {
                let deleted = diesel::delete(
                    pipeline_runs::table
                        .filter(pipeline_runs::symbol.eq(symbol))
                        .filter(pipeline_runs::logical_date.eq(date)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(deleted > 0)
            })
            .await
    }
}
