use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::debug;
use std::sync::Arc;

use super::model::{MarketDataRowDB, NewMarketDataRowDB};
use crate::db::{get_connection, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::market_data::dsl as market_data_dsl;
use dailybar_core::config::ConflictPolicy;
use dailybar_core::records::{MarketDataRecord, MarketDataStore, WriteOutcome};
use dailybar_core::Result;

pub struct MarketDataRepository {
    pool: Arc<Pool<ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
}

impl MarketDataRepository {
    pub fn new(pool: Arc<Pool<ConnectionManager<SqliteConnection>>>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl MarketDataStore for MarketDataRepository {
    async fn insert_record(
        &self,
        record: &MarketDataRecord,
        policy: ConflictPolicy,
    ) -> Result<WriteOutcome> {
        let row = NewMarketDataRowDB::from(record);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<WriteOutcome> {
                let existing = market_data_dsl::market_data
                    .filter(market_data_dsl::date.eq(row.date))
                    .filter(market_data_dsl::symbol.eq(&row.symbol))
                    .select(market_data_dsl::id)
                    .first::<i64>(conn)
                    .optional()
                    .map_err(StorageError::from)?;

                match (existing, policy) {
                    (None, _) => {
                        diesel::insert_into(market_data_dsl::market_data)
                            .values(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                        Ok(WriteOutcome::Inserted)
                    }
                    (Some(id), ConflictPolicy::Reject) => {
                        debug!("market_data row {} kept for {} {}", id, row.symbol, row.date);
                        Ok(WriteOutcome::AlreadyPresent)
                    }
                    (Some(id), ConflictPolicy::Overwrite) => {
                        diesel::update(market_data_dsl::market_data.find(id))
                            .set(&row)
                            .execute(conn)
                            .map_err(StorageError::from)?;
                        Ok(WriteOutcome::Replaced)
                    }
                }
            })
            .await
    }

    fn list_records(&self) -> Result<Vec<MarketDataRecord>> {
        let mut conn = get_connection(&self.pool)?;

        let rows = market_data_dsl::market_data
            .order((
                market_data_dsl::date.asc(),
                market_data_dsl::symbol.asc(),
                market_data_dsl::id.asc(),
            ))
            .select(MarketDataRowDB::as_select())
            .load::<MarketDataRowDB>(&mut conn)
            .into_core()?;

        rows.into_iter()
            .map(MarketDataRecord::try_from)
            .collect::<std::result::Result<Vec<_>, StorageError>>()
            .into_core()
    }

    fn count_records(&self) -> Result<usize> {
        let mut conn = get_connection(&self.pool)?;
        let count = market_data_dsl::market_data
            .count()
            .get_result::<i64>(&mut conn)
            .into_core()?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    async fn create_test_repository() -> (MarketDataRepository, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = create_pool(&db_path_str).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone());

        (MarketDataRepository::new(Arc::clone(&pool), writer), temp_dir)
    }

    fn jan(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn record(date: NaiveDate, close: rust_decimal::Decimal) -> MarketDataRecord {
        MarketDataRecord {
            open: Some(dec!(99.50)),
            high: Some(dec!(102.50)),
            low: Some(dec!(98.50)),
            close: Some(close),
            volume: Some(1_000_000),
            after_hours: Some(dec!(100.40)),
            ..MarketDataRecord::empty("OK", date, "AMZN")
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let (repo, _dir) = create_test_repository().await;

        let outcome = repo
            .insert_record(&record(jan(2), dec!(100.50)), ConflictPolicy::Reject)
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Inserted);
        let rows = repo.list_records().unwrap();
        assert_eq!(rows, vec![record(jan(2), dec!(100.50))]);
        assert_eq!(rows[0].pre_market, None);
        assert_eq!(repo.count_records().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reject_keeps_existing_row() {
        let (repo, _dir) = create_test_repository().await;
        repo.insert_record(&record(jan(2), dec!(100.50)), ConflictPolicy::Reject)
            .await
            .unwrap();

        let outcome = repo
            .insert_record(&record(jan(2), dec!(101.00)), ConflictPolicy::Reject)
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::AlreadyPresent);
        let rows = repo.list_records().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, Some(dec!(100.50)));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_row() {
        let (repo, _dir) = create_test_repository().await;
        repo.insert_record(&record(jan(2), dec!(100.50)), ConflictPolicy::Overwrite)
            .await
            .unwrap();

        let mut replacement = record(jan(2), dec!(101.00));
        replacement.after_hours = None;
        let outcome = repo
            .insert_record(&replacement, ConflictPolicy::Overwrite)
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome::Replaced);
        let rows = repo.list_records().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].close, Some(dec!(101.00)));
        assert_eq!(rows[0].after_hours, None);
    }

    #[tokio::test]
    async fn test_rows_are_listed_by_date() {
        let (repo, _dir) = create_test_repository().await;
        for d in [3, 1, 2] {
            repo.insert_record(&record(jan(d), dec!(100.00)), ConflictPolicy::Reject)
                .await
                .unwrap();
        }

        let dates: Vec<_> = repo.list_records().unwrap().iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![jan(1), jan(2), jan(3)]);
    }

    #[derive(diesel::QueryableByName)]
    struct StoredType {
        #[diesel(sql_type = diesel::sql_types::Text)]
        close_type: String,
    }

    #[tokio::test]
    async fn test_prices_are_stored_as_numbers_and_read_back_at_two_decimals() {
        let (repo, _dir) = create_test_repository().await;
        repo.insert_record(&record(jan(1), dec!(100.50)), ConflictPolicy::Reject)
            .await
            .unwrap();
        repo.insert_record(&record(jan(2), dec!(101.00)), ConflictPolicy::Reject)
            .await
            .unwrap();

        let mut conn = get_connection(&repo.pool).unwrap();
        let types: Vec<String> =
            diesel::sql_query("SELECT typeof(close) AS close_type FROM market_data ORDER BY date")
                .load::<StoredType>(&mut conn)
                .unwrap()
                .into_iter()
                .map(|t| t.close_type)
                .collect();
        assert_eq!(types, vec!["real", "integer"]);

        let closes: Vec<_> = repo.list_records().unwrap().iter().map(|r| r.close).collect();
        assert_eq!(closes, vec![Some(dec!(100.50)), Some(dec!(101.00))]);
        assert!(closes.iter().all(|c| c.map(|d| d.scale()) == Some(2)));
    }

    #[tokio::test]
    async fn test_empty_table() {
        let (repo, _dir) = create_test_repository().await;
        assert!(repo.list_records().unwrap().is_empty());
        assert_eq!(repo.count_records().unwrap(), 0);
    }
}
