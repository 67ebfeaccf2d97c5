//! Database models for the `market_data` table.

use chrono::{NaiveDateTime, NaiveTime};
use diesel::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::errors::StorageError;
use dailybar_core::records::MarketDataRecord;

const PRICE_SCALE: u32 = 2;

/// A stored row, including its rowid.
///
/// Price columns have NUMERIC affinity. Prices are bound as 2 dp text, which
/// SQLite converts to REAL (or INTEGER for whole values) on insert; they are
/// read back as text and rescaled to 2 dp by `price_from_db`.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::market_data)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MarketDataRowDB {
    pub id: i64,
    pub status: String,
    pub date: NaiveDateTime,
    pub symbol: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<i64>,
    pub after_hours: Option<String>,
    pub pre_market: Option<String>,
}

/// Values written for one record.
#[derive(Insertable, AsChangeset, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::market_data)]
#[diesel(treat_none_as_null = true)]
pub struct NewMarketDataRowDB {
    pub status: String,
    pub date: NaiveDateTime,
    pub symbol: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<i64>,
    pub after_hours: Option<String>,
    pub pre_market: Option<String>,
}

fn price_to_db(price: Option<Decimal>) -> Option<String> {
    price.map(|p| {
        format!(
            "{:.2}",
            p.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
        )
    })
}

fn price_from_db(column: &str, value: Option<String>) -> Result<Option<Decimal>, StorageError> {
    let Some(text) = value else {
        return Ok(None);
    };
    let text = text.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map(|mut d| {
            d.rescale(PRICE_SCALE);
            Some(d)
        })
        .map_err(|_| StorageError::Corrupt(format!("{} = '{}'", column, text)))
}

impl From<&MarketDataRecord> for NewMarketDataRowDB {
    fn from(record: &MarketDataRecord) -> Self {
        Self {
            status: record.status.clone(),
            date: record.date.and_time(NaiveTime::MIN),
            symbol: record.symbol.clone(),
            open: price_to_db(record.open),
            high: price_to_db(record.high),
            low: price_to_db(record.low),
            close: price_to_db(record.close),
            volume: record.volume,
            after_hours: price_to_db(record.after_hours),
            pre_market: price_to_db(record.pre_market),
        }
    }
}

impl TryFrom<MarketDataRowDB> for MarketDataRecord {
    type Error = StorageError;

    fn try_from(row: MarketDataRowDB) -> Result<Self, Self::Error> {
        Ok(MarketDataRecord {
            status: row.status,
            date: row.date.date(),
            symbol: row.symbol,
            open: price_from_db("open", row.open)?,
            high: price_from_db("high", row.high)?,
            low: price_from_db("low", row.low)?,
            close: price_from_db("close", row.close)?,
            volume: row.volume,
            after_hours: price_from_db("afterHours", row.after_hours)?,
            pre_market: price_from_db("preMarket", row.pre_market)?,
        })
    }
}
