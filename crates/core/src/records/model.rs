use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status value of a payload that carries data worth storing.
pub const OK_STATUS: &str = "OK";

/// Status used when the payload has none.
pub const DEFAULT_STATUS: &str = "closed";

/// One normalized daily data point, matching the `market_data` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDataRecord {
    pub status: String,
    pub date: NaiveDate,
    pub symbol: String,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub close: Option<Decimal>,
    pub volume: Option<i64>,
    pub after_hours: Option<Decimal>,
    pub pre_market: Option<Decimal>,
}

impl MarketDataRecord {
    /// A record with every optional field empty.
    pub fn empty(status: impl Into<String>, date: NaiveDate, symbol: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            date,
            symbol: symbol.into(),
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            after_hours: None,
            pre_market: None,
        }
    }

    /// Only records with status "OK" are written to the store.
    pub fn is_ok(&self) -> bool {
        self.status == OK_STATUS
    }

    /// Identity of the row in the store.
    pub fn key(&self) -> (NaiveDate, &str) {
        (self.date, self.symbol.as_str())
    }
}
