//! Feed fetcher abstraction and implementations.
//!
//! This module contains:
//! - The `FeedFetcher` trait the run coordinator depends on
//! - The Polygon.io daily open/close implementation

mod traits;

pub mod polygon;

pub use traits::FeedFetcher;
