//! dailybar Feed Crate
//!
//! The boundary between the pipeline and the external market data feed.
//!
//! # Overview
//!
//! The pipeline asks the feed for one payload per (instrument, logical date).
//! Everything behind that request (HTTP, credentials, status codes) lives in
//! this crate so the run coordinator only deals with:
//!
//! - [`FeedFetcher`] - the async fetch contract
//! - [`RawFeedRecord`] - the opaque payload handed to the transformer
//! - [`FeedError`] - fetch failures, each carrying a [`RetryClass`]
//!
//! ```text
//! +------------------+     +--------------------+     +------------------+
//! |  RunCoordinator  | --> |    FeedFetcher     | --> |  RawFeedRecord   |
//! +------------------+     +--------------------+     +------------------+
//!                                   |
//!                                   v
//!                          +--------------------+
//!                          | CredentialProvider |  (resolved per call)
//!                          +--------------------+
//! ```
//!
//! Fetchers never retry on their own. Retrying is the coordinator's call,
//! driven by [`FeedError::retry_class`].

pub mod credentials;
pub mod errors;
pub mod models;
pub mod provider;

pub use credentials::{CredentialProvider, EnvCredentialProvider, StaticCredentialProvider};
pub use errors::{FeedError, RetryClass};
pub use models::RawFeedRecord;
pub use provider::polygon::PolygonFetcher;
pub use provider::FeedFetcher;
