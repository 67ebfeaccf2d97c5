use chrono::{Days, NaiveDate};

/// Logical dates from `start` through `end` inclusive, `interval_days` apart.
///
/// Empty when `end` precedes `start` or the interval is zero.
pub fn logical_dates(start: NaiveDate, end: NaiveDate, interval_days: u32) -> Vec<NaiveDate> {
    if interval_days == 0 {
        return Vec::new();
    }
    let step = Days::new(u64::from(interval_days));
    std::iter::successors(Some(start), |date| date.checked_add_days(step))
        .take_while(|date| *date <= end)
        .collect()
}
