//! Date helpers for threshold rules.
//!
//! Anniversaries are computed by calendar months, so a Feb 29 start lands on
//! Feb 28 in non-leap years.

use chrono::{Months, NaiveDate};

use crate::error::LedgerError;

/// The date `years` calendar years after `date`
pub fn years_after(date: NaiveDate, years: u32) -> Result<NaiveDate, LedgerError> {
    date.checked_add_months(Months::new(years * 12))
        .ok_or(LedgerError::DateOutOfRange(date))
}

/// Whole days from `from` to `to` (negative when `to` is earlier)
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Number of calendar days covered by [start, end], counting both ends
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    days_between(start, end) + 1
}

/// True only when `date` falls after `threshold`; the threshold day itself does not qualify.
pub fn is_strictly_after(date: NaiveDate, threshold: NaiveDate) -> bool {
    date > threshold
}

/// First and last day of a calendar year
pub fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_years_after_regular_and_leap_day() {
        assert_eq!(years_after(date(2023, 6, 1), 2).unwrap(), date(2025, 6, 1));
        assert_eq!(years_after(date(2024, 2, 29), 1).unwrap(), date(2025, 2, 28));
        assert_eq!(years_after(date(2024, 2, 29), 4).unwrap(), date(2028, 2, 29));
    }

    #[test]
    fn test_boundary_day_is_not_after() {
        let threshold = date(2025, 6, 1);
        assert!(!is_strictly_after(threshold, threshold));
        assert!(is_strictly_after(date(2025, 6, 2), threshold));
        assert!(!is_strictly_after(date(2025, 5, 31), threshold));
    }

    #[test]
    fn test_day_counts() {
        assert_eq!(days_between(date(2024, 1, 1), date(2024, 12, 31)), 365);
        assert_eq!(inclusive_days(date(2023, 1, 1), date(2023, 12, 31)), 365);
        assert_eq!(days_between(date(2024, 1, 2), date(2024, 1, 1)), -1);
    }

    #[test]
    fn test_year_bounds() {
        assert_eq!(year_bounds(2024), Some((date(2024, 1, 1), date(2024, 12, 31))));
    }
}
