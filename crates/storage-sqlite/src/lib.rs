//! SQLite storage for dailybar.
//!
//! Implements the storage traits defined in `dailybar-core` with Diesel and
//! SQLite:
//! - connection pooling and the single-writer actor
//! - embedded migrations for `market_data` and `pipeline_runs`
//! - repositories for market data rows and run history
//!
//! ```text
//!        core (pipeline)
//!              │
//!              ▼
//!   storage-sqlite (this crate)
//!              │
//!              ▼
//!          SQLite DB
//! ```

pub mod db;
pub mod errors;
pub mod schema;

pub mod market_data;
pub mod runs;
pub mod schema_initializer;

pub use db::{
    create_pool, get_connection, init, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle, DEFAULT_DB_PATH,
};
pub use errors::{IntoCore, StorageError};
pub use market_data::MarketDataRepository;
pub use runs::RunRepository;
pub use schema_initializer::SqliteSchemaInitializer;
