//! Schema creation through the embedded migrations.

use async_trait::async_trait;
use std::sync::Arc;

use crate::db::{run_migrations, DbPool};
use crate::errors::StorageError;
use dailybar_core::records::{SchemaInitializer, SchemaStatus};
use dailybar_core::{Error, Result};

/// Brings the database up to the current schema.
pub struct SqliteSchemaInitializer {
    pool: Arc<DbPool>,
}

impl SqliteSchemaInitializer {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaInitializer for SqliteSchemaInitializer {
    async fn ensure_schema(&self) -> Result<SchemaStatus> {
        let pool = Arc::clone(&self.pool);
        let applied = tokio::task::spawn_blocking(move || run_migrations(&pool))
            .await
            .map_err(|e| Error::from(StorageError::MigrationFailed(e.to_string())))??;

        Ok(if applied.is_empty() {
            SchemaStatus::AlreadyPresent
        } else {
            SchemaStatus::Created
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, get_connection};
    use diesel::connection::SimpleConnection;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_second_call_finds_schema_present() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("schema.db");
        let pool = create_pool(&db_path.to_string_lossy()).unwrap();
        let initializer = SqliteSchemaInitializer::new(Arc::clone(&pool));

        assert_eq!(initializer.ensure_schema().await.unwrap(), SchemaStatus::Created);
        assert_eq!(
            initializer.ensure_schema().await.unwrap(),
            SchemaStatus::AlreadyPresent
        );

        let mut conn = get_connection(&pool).unwrap();
        conn.batch_execute("SELECT status, date, symbol, open, high, low, close, volume, \"afterHours\", \"preMarket\" FROM market_data")
            .unwrap();
        conn.batch_execute("SELECT run_id, state, attempts FROM pipeline_runs")
            .unwrap();
    }
}
