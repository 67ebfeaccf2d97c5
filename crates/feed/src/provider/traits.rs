//! Feed fetcher trait definition.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::FeedError;
use crate::models::RawFeedRecord;

/// Trait for daily market data feeds.
///
/// Implement this trait to plug a new data source into the pipeline.
/// Implementations perform exactly one request per call and report every
/// failure upward; retrying is the run coordinator's responsibility.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use dailybar_feed::{FeedError, FeedFetcher, RawFeedRecord};
///
/// struct CsvReplay { rows: HashMap<NaiveDate, RawFeedRecord> }
///
/// #[async_trait]
/// impl FeedFetcher for CsvReplay {
///     fn id(&self) -> &'static str {
///         "CSV_REPLAY"
///     }
///
///     async fn fetch(&self, symbol: &str, date: NaiveDate) -> Result<RawFeedRecord, FeedError> {
///         self.rows
///             .get(&date)
///             .cloned()
///             .ok_or_else(|| FeedError::SymbolNotFound(symbol.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Unique identifier for this feed, e.g. "POLYGON".
    /// Used for logging and attempt history.
    fn id(&self) -> &'static str;

    /// Fetch the raw payload for `symbol` on the logical `date`.
    ///
    /// # Returns
    ///
    /// The decoded payload, which contains at least a status indicator,
    /// or a `FeedError` classified for the retry policy.
    async fn fetch(&self, symbol: &str, date: NaiveDate) -> Result<RawFeedRecord, FeedError>;
}
