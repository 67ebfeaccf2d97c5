//! dailybar Core - run coordination, transformation and loading.
//!
//! This crate holds the pipeline's business logic. It is storage-agnostic
//! and defines the traits that the `storage-sqlite` crate implements:
//!
//! - [`records::SchemaInitializer`] and [`records::MarketDataStore`] for the
//!   `market_data` table
//! - [`runs::RunStore`] for run history
//!
//! The feed side comes from `dailybar-feed`.

pub mod config;
pub mod errors;
pub mod records;
pub mod runs;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ConflictPolicy, FetchRetryPolicy, PipelineConfig};
pub use errors::{DatabaseError, Error, Result, TransformError};
pub use records::{LoadOutcome, LoadReport, MarketDataRecord};
pub use runs::{LogicalDateRun, PipelineComponents, RunCoordinator, RunReport, RunState};
