//! Error types and retry classification for the feed crate.
//!
//! This module provides:
//! - [`FeedError`]: The main error enum for all fetch operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Errors that can occur while fetching a daily payload from the feed.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method, which the run coordinator uses
/// to decide between another attempt and failing the run.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The requested symbol is unknown to the feed.
    /// This is a terminal error - retrying won't help.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The credential was rejected (HTTP 401/403).
    #[error("Unauthorized: {provider}")]
    Unauthorized {
        /// The provider that rejected the credential
        provider: String,
    },

    /// No credential could be resolved for the provider.
    #[error("Missing credential: {name}")]
    MissingCredential {
        /// Name of the credential that could not be resolved
        name: String,
    },

    /// The provider rate limited the request (HTTP 429).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider failed on its side (HTTP 5xx).
    #[error("Server error: {provider} - HTTP {status}")]
    ServerError {
        /// The provider that returned the error
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// The provider refused the request (HTTP 4xx other than 401/403/429).
    #[error("Client error: {provider} - HTTP {status}: {message}")]
    ClientError {
        /// The provider that returned the error
        provider: String,
        /// HTTP status code
        status: u16,
        /// The error message from the provider
        message: String,
    },

    /// The provider answered with a body that is not a usable payload.
    #[error("Invalid response: {provider} - {message}")]
    InvalidResponse {
        /// The provider that returned the body
        provider: String,
        /// Description of the problem
        message: String,
    },

    /// A network error occurred while communicating with a provider.
    ///
    /// Built only through [`FeedError::network`], which strips the request
    /// URL and the credential in its query string.
    #[error("Network error: {0}")]
    Network(reqwest::Error),
}

impl FeedError {
    /// Wrap a transport failure without the request URL.
    pub fn network(error: reqwest::Error) -> Self {
        Self::Network(error.without_url())
    }

    /// Returns the retry classification for this error.
    ///
    /// - [`RetryClass::Never`]: The request is invalid, fail the run now
    /// - [`RetryClass::WithBackoff`]: Transient, retry after the delay
    ///
    /// # Examples
    ///
    /// ```
    /// use dailybar_feed::errors::{FeedError, RetryClass};
    ///
    /// let error = FeedError::RateLimited { provider: "POLYGON".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = FeedError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Terminal errors - never retry
            Self::SymbolNotFound(_)
            | Self::Unauthorized { .. }
            | Self::MissingCredential { .. }
            | Self::ClientError { .. }
            | Self::InvalidResponse { .. } => RetryClass::Never,

            // Transient errors - retry after the delay
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::ServerError { .. }
            | Self::Network(_) => RetryClass::WithBackoff,
        }
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_transient(&self) -> bool {
        self.retry_class().is_retryable()
    }
}
