//! Status-conditioned loading of transformed records.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::initializer::SchemaReady;
use super::model::MarketDataRecord;
use super::store::{MarketDataStore, WriteOutcome};
use crate::config::ConflictPolicy;
use crate::errors::{DatabaseError, Error, Result};

/// What the loader did with one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadOutcome {
    /// A new row was appended.
    Inserted,
    /// An existing (date, symbol) row was replaced.
    Replaced,
    /// An existing (date, symbol) row was kept and nothing was written.
    AlreadyPresent,
    /// The record's status was not "OK"; nothing was written.
    Skipped { status: String },
}

impl LoadOutcome {
    pub fn wrote_row(&self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced)
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

impl From<WriteOutcome> for LoadOutcome {
    fn from(outcome: WriteOutcome) -> Self {
        match outcome {
            WriteOutcome::Inserted => Self::Inserted,
            WriteOutcome::Replaced => Self::Replaced,
            WriteOutcome::AlreadyPresent => Self::AlreadyPresent,
        }
    }
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted => write!(f, "loaded"),
            Self::Replaced => write!(f, "replaced existing row"),
            Self::AlreadyPresent => write!(f, "already present"),
            Self::Skipped { status } => write!(f, "skipped (status {})", status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub outcome: LoadOutcome,
    /// Rows in the table after the load, from the read-back.
    pub table_rows: usize,
}

/// Writes "OK" records and skips everything else.
pub struct MarketDataLoader {
    store: Arc<dyn MarketDataStore>,
    policy: ConflictPolicy,
}

impl MarketDataLoader {
    pub fn new(store: Arc<dyn MarketDataStore>, policy: ConflictPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Load one record. Requires the schema to be in place.
    pub async fn load(&self, _ready: SchemaReady, record: &MarketDataRecord) -> Result<LoadReport> {
        if !record.is_ok() {
            let table_rows = self.store.count_records()?;
            info!(
                "Skipping {} {}: status {} (table holds {} rows)",
                record.symbol, record.date, record.status, table_rows
            );
            return Ok(LoadReport {
                outcome: LoadOutcome::Skipped {
                    status: record.status.clone(),
                },
                table_rows,
            });
        }

        let outcome: LoadOutcome = self.store.insert_record(record, self.policy).await?.into();

        let rows = self.store.list_records()?;
        debug!("market_data after load of {} {}: {:?}", record.symbol, record.date, rows);

        if !rows.iter().any(|row| row.key() == record.key()) {
            return Err(Error::Database(DatabaseError::Internal(format!(
                "row for {} {} missing after write",
                record.symbol, record.date
            ))));
        }

        info!(
            "{} {}: {} (table holds {} rows)",
            record.symbol,
            record.date,
            outcome,
            rows.len()
        );
        Ok(LoadReport {
            outcome,
            table_rows: rows.len(),
        })
    }

    /// The full table, for verification.
    pub fn table(&self) -> Result<Vec<MarketDataRecord>> {
        self.store.list_records()
    }
}
