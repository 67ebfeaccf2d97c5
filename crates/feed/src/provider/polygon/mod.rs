//! Polygon.io daily open/close fetcher.
//!
//! # API Endpoint
//!
//! - Daily bar: `https://api.polygon.io/v1/open-close/{symbol}/{date}?adjusted=true&apiKey={key}`
//!
//! # Response Format
//!
//! A flat JSON object:
//!
//! ```json
//! {"status":"OK","from":"2025-01-02","symbol":"AMZN","open":222.03,"high":225.15,
//!  "low":218.19,"close":220.22,"volume":33956579,"afterHours":220.4,"preMarket":221.5}
//! ```
//!
//! Days without trading answer HTTP 404 with `{"status":"NOT_FOUND",...}`. That
//! body is handed on as a payload so the loader can record a skip instead of
//! failing the run.

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::credentials::CredentialProvider;
use crate::errors::FeedError;
use crate::models::RawFeedRecord;
use crate::provider::FeedFetcher;

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
const PROVIDER_ID: &str = "POLYGON";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest provider message kept in a `ClientError`.
const MAX_ERROR_MESSAGE_LEN: usize = 200;

/// Polygon.io fetcher for one daily bar per request.
///
/// # Example
///
/// ```ignore
/// let fetcher = PolygonFetcher::new(Arc::new(EnvCredentialProvider::polygon()));
/// let raw = fetcher.fetch("AMZN", NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()).await?;
/// ```
pub struct PolygonFetcher {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl PolygonFetcher {
    /// Create a fetcher against the public Polygon endpoint.
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials,
        }
    }

    /// Point the fetcher at another host (proxy, sandbox).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, symbol: &str, date: NaiveDate) -> String {
        format!(
            "{}/v1/open-close/{}/{}",
            self.base_url,
            symbol,
            date.format("%Y-%m-%d")
        )
    }

    fn map_transport_error(error: reqwest::Error) -> FeedError {
        if error.is_timeout() {
            FeedError::Timeout {
                provider: PROVIDER_ID.to_string(),
            }
        } else {
            FeedError::network(error)
        }
    }

    /// Map an HTTP status and body onto a payload or a classified error.
    fn interpret_response(
        status: StatusCode,
        body: &str,
        symbol: &str,
    ) -> Result<RawFeedRecord, FeedError> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }

        if status.is_server_error() {
            return Err(FeedError::ServerError {
                provider: PROVIDER_ID.to_string(),
                status: status.as_u16(),
            });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FeedError::Unauthorized {
                provider: PROVIDER_ID.to_string(),
            });
        }

        let parsed = serde_json::from_str::<RawFeedRecord>(body);

        if status == StatusCode::NOT_FOUND {
            // "No data for this date" comes back as 404 with a status body.
            return match parsed {
                Ok(record) if record.status().is_some() => Ok(record),
                _ => Err(FeedError::SymbolNotFound(symbol.to_string())),
            };
        }

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|record| {
                    record
                        .get("error")
                        .or_else(|| record.get("message"))
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| body.chars().take(MAX_ERROR_MESSAGE_LEN).collect());
            return Err(FeedError::ClientError {
                provider: PROVIDER_ID.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let record = parsed.map_err(|e| FeedError::InvalidResponse {
            provider: PROVIDER_ID.to_string(),
            message: format!("Failed to parse response: {}", e),
        })?;

        if record.status().is_none() {
            return Err(FeedError::InvalidResponse {
                provider: PROVIDER_ID.to_string(),
                message: "Response has no status field".to_string(),
            });
        }

        Ok(record)
    }
}

#[async_trait]
impl FeedFetcher for PolygonFetcher {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn fetch(&self, symbol: &str, date: NaiveDate) -> Result<RawFeedRecord, FeedError> {
        let api_key = self.credentials.api_key()?;
        let url = self.endpoint(symbol, date);
        debug!("Fetching {} {} from {}", symbol, date, url);

        let response = self
            .client
            .get(&url)
            .query(&[("adjusted", "true"), ("apiKey", api_key.as_str())])
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::map_transport_error)?;

        let result = Self::interpret_response(status, &body, symbol);
        if let Err(ref e) = result {
            warn!("{} fetch for {} on {} failed: {}", PROVIDER_ID, symbol, date, e);
        }
        result
    }
}
