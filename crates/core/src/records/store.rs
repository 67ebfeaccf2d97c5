//! Storage traits for market data records.
//!
//! These traits abstract the persistence layer. The SQLite implementation
//! lives in `dailybar-storage-sqlite`.

use async_trait::async_trait;

use super::model::MarketDataRecord;
use crate::config::ConflictPolicy;
use crate::errors::Result;

/// Result of an `ensure_schema` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    /// The table structure was created by this call.
    Created,
    /// Everything was already in place; nothing changed.
    AlreadyPresent,
}

/// Creates the fixed table structure when it is missing.
#[async_trait]
pub trait SchemaInitializer: Send + Sync {
    /// Idempotent: a second call on the same store reports `AlreadyPresent`.
    async fn ensure_schema(&self) -> Result<SchemaStatus>;
}

/// What a single insert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    /// A row with the same (date, symbol) was replaced (`Overwrite` policy).
    Replaced,
    /// A row with the same (date, symbol) exists and was kept (`Reject` policy).
    AlreadyPresent,
}

/// Append-only access to the `market_data` table.
#[async_trait]
pub trait MarketDataStore: Send + Sync {
    /// Write one record. Each call is its own unit of work.
    async fn insert_record(
        &self,
        record: &MarketDataRecord,
        policy: ConflictPolicy,
    ) -> Result<WriteOutcome>;

    /// Every stored row, ordered by date then symbol.
    fn list_records(&self) -> Result<Vec<MarketDataRecord>>;

    fn count_records(&self) -> Result<usize>;
}
