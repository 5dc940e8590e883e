//! Calendar-month helpers.
//!
//! Every observation is keyed by the first day of its month. Dates are
//! accepted as `YYYY-MM` or `YYYY/MM`; a trailing day component is ignored.

use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};

/// Parse a `YYYY-MM` / `YYYY/MM` string into the first day of that month.
///
/// # Example
/// ```
/// use anofox_growth::core::parse_month;
/// use chrono::NaiveDate;
///
/// let d = parse_month("2021/07").unwrap();
/// assert_eq!(d, NaiveDate::from_ymd_opt(2021, 7, 1).unwrap());
/// assert!(parse_month("2021-13").is_err());
/// ```
pub fn parse_month(s: &str) -> Result<NaiveDate> {
    let trimmed = s.trim();
    let mut parts = trimmed.split(['-', '/']);

    let year = parts
        .next()
        .filter(|p| p.len() == 4)
        .and_then(|p| p.parse::<i32>().ok());
    let month = parts
        .next()
        .filter(|p| !p.is_empty() && p.len() <= 2)
        .and_then(|p| p.parse::<u32>().ok());

    match (year, month) {
        (Some(y), Some(m)) => NaiveDate::from_ymd_opt(y, m, 1)
            .ok_or_else(|| ForecastError::InvalidDate(trimmed.to_string())),
        _ => Err(ForecastError::InvalidDate(trimmed.to_string())),
    }
}

/// Format a date as `YYYY-MM`.
pub fn format_month(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Absolute month ordinal (`year * 12 + month0`).
pub fn month_ordinal(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

/// Calendar month bucket, 0 = January.
pub fn calendar_month(date: NaiveDate) -> usize {
    date.month0() as usize
}

/// Shift a month-start date by `months` (may be negative).
pub fn add_months(date: NaiveDate, months: i64) -> NaiveDate {
    let ordinal = month_ordinal(date) + months;
    let year = ordinal.div_euclid(12) as i32;
    let month0 = ordinal.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(date)
}

/// Whole days from `earlier` to `later` (negative if `later` precedes).
pub fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}
