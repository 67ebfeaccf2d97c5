//! Feed models
//!
//! - `raw_record` - The opaque payload returned for one (instrument, logical date)

mod raw_record;

pub use raw_record::RawFeedRecord;
