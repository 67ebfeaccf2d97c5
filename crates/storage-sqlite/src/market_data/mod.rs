//! The `market_data` table.

mod model;
mod repository;

pub use model::{MarketDataRowDB, NewMarketDataRowDB};
pub use repository::MarketDataRepository;
