//! Mapping of raw feed payloads onto [`MarketDataRecord`].
//!
//! | field | payload key | default |
//! |-------|-------------|---------|
//! | status | `status` | `"closed"` |
//! | date | `from` (or `date`) | logical date |
//! | symbol | `symbol` | configured instrument |
//! | open/high/low/close | same name | null |
//! | volume | `volume` | null |
//! | after_hours | `afterHours` | null |
//! | pre_market | `preMarket` | null |
//!
//! Prices are rounded to two fractional digits, volume to a whole number.

use chrono::{DateTime, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Number, Value};
use std::str::FromStr;

use dailybar_feed::RawFeedRecord;

use super::model::{MarketDataRecord, DEFAULT_STATUS};
use crate::errors::TransformError;

const PRICE_SCALE: u32 = 2;
const DATE_KEYS: [&str; 2] = ["from", "date"];

/// Stateless mapper bound to the configured instrument.
#[derive(Debug, Clone)]
pub struct Transformer {
    symbol: String,
}

impl Transformer {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Produce exactly one record for `raw` on `logical_date`.
    pub fn transform(
        &self,
        raw: &RawFeedRecord,
        logical_date: NaiveDate,
    ) -> Result<MarketDataRecord, TransformError> {
        transform(raw, logical_date, &self.symbol)
    }
}

/// Pure mapping; identical inputs always give identical records.
pub fn transform(
    raw: &RawFeedRecord,
    logical_date: NaiveDate,
    default_symbol: &str,
) -> Result<MarketDataRecord, TransformError> {
    Ok(MarketDataRecord {
        status: read_text(raw, "status")?.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        date: read_date(raw)?.unwrap_or(logical_date),
        symbol: read_text(raw, "symbol")?.unwrap_or_else(|| default_symbol.to_string()),
        open: read_price(raw, "open")?,
        high: read_price(raw, "high")?,
        low: read_price(raw, "low")?,
        close: read_price(raw, "close")?,
        volume: read_volume(raw, "volume")?,
        after_hours: read_price(raw, "afterHours")?,
        pre_market: read_price(raw, "preMarket")?,
    })
}

fn invalid(field: &str, value: &Value) -> TransformError {
    TransformError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    }
}

fn read_text(raw: &RawFeedRecord, field: &str) -> Result<Option<String>, TransformError> {
    match raw.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(invalid(field, other)),
    }
}

fn read_date(raw: &RawFeedRecord) -> Result<Option<NaiveDate>, TransformError> {
    let Some((field, value)) = DATE_KEYS
        .iter()
        .find_map(|key| raw.get(key).map(|value| (*key, value)))
    else {
        return Ok(None);
    };

    let text = value.as_str().ok_or_else(|| invalid(field, value))?.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(text).map(|dt| dt.date_naive()))
        .map(Some)
        .map_err(|_| TransformError::InvalidDate {
            field: field.to_string(),
            value: text.to_string(),
        })
}

fn number_to_decimal(number: &Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .ok()
        .or_else(|| Decimal::from_scientific(&text).ok())
        .or_else(|| number.as_f64().and_then(Decimal::from_f64_retain))
}

fn read_decimal(raw: &RawFeedRecord, field: &str) -> Result<Option<Decimal>, TransformError> {
    let Some(value) = raw.get(field) else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Number(n) => number_to_decimal(n),
        Value::String(s) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .ok(),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| invalid(field, value))
}

fn read_price(raw: &RawFeedRecord, field: &str) -> Result<Option<Decimal>, TransformError> {
    Ok(read_decimal(raw, field)?
        .map(|d| d.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)))
}

fn read_volume(raw: &RawFeedRecord, field: &str) -> Result<Option<i64>, TransformError> {
    let Some(decimal) = read_decimal(raw, field)? else {
        return Ok(None);
    };
    decimal
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .map(Some)
        .ok_or_else(|| TransformError::InvalidField {
            field: field.to_string(),
            value: decimal.to_string(),
        })
}
