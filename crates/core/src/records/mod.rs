//! Market data records: model, transformation, schema initialization and loading.

mod initializer;
mod loader;
mod model;
mod store;
mod transform;

pub use initializer::{SchemaReady, StoreInitializer};
pub use loader::{LoadOutcome, LoadReport, MarketDataLoader};
pub use model::{MarketDataRecord, DEFAULT_STATUS, OK_STATUS};
pub use store::{MarketDataStore, SchemaInitializer, SchemaStatus, WriteOutcome};
pub use transform::{transform, Transformer};
