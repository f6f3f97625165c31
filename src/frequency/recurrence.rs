//! # Recurrence Calculator
//!
//! Advances an anchor timestamp by one recurrence period.
//!
//! Day and week periods are fixed-length. Month, quarter and year periods use
//! calendar arithmetic in which the day-of-month is kept and any overflow past
//! the end of the target month rolls forward into the next one:
//!
//! - Jan 31 + 1 month → Mar 3 (Mar 2 in a leap year)
//! - Feb 29 + 1 year → Mar 1
//! - Nov 30 + 3 months → Mar 2 (Mar 1 in a leap year)
//!
//! Time of day is preserved. Everything is computed in UTC.

use super::{normalize, Frequency};
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};

/// Compute the next due timestamp for `frequency` starting at `anchor`
pub fn next_due(frequency: Frequency, anchor: DateTime<Utc>) -> DateTime<Utc> {
    match frequency {
        Frequency::Daily => add_days(anchor, 1),
        Frequency::Weekly => add_days(anchor, 7),
        Frequency::Monthly => add_calendar_months(anchor, 1),
        Frequency::Quarterly => add_calendar_months(anchor, 3),
        Frequency::Yearly => add_calendar_months(anchor, 12),
    }
}

/// Normalize raw recurrence text and compute the next due timestamp
pub fn next_due_from_raw(raw: Option<&str>, anchor: DateTime<Utc>) -> DateTime<Utc> {
    next_due(normalize(raw), anchor)
}

fn add_days(anchor: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    anchor
        .checked_add_signed(Duration::days(days))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Add calendar months with forward overflow of the day-of-month.
///
/// Saturates at the largest representable timestamp instead of failing.
pub fn add_calendar_months(anchor: DateTime<Utc>, months: u32) -> DateTime<Utc> {
    let date = anchor.date_naive();
    let month_index = i64::from(date.year()) * 12 + i64::from(date.month0()) + i64::from(months);

    let target = i32::try_from(month_index.div_euclid(12))
        .ok()
        .and_then(|year| {
            // rem_euclid(12) is always in 0..12
            let month = u32::try_from(month_index.rem_euclid(12)).ok()? + 1;
            NaiveDate::from_ymd_opt(year, month, 1)
        })
        .and_then(|first| first.checked_add_days(Days::new(u64::from(date.day() - 1))));

    match target {
        Some(day) => day.and_time(anchor.time()).and_utc(),
        None => DateTime::<Utc>::MAX_UTC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_fixed_length_periods() {
        let anchor = at(2024, 3, 10);
        assert_eq!(next_due(Frequency::Daily, anchor), at(2024, 3, 11));
        assert_eq!(next_due(Frequency::Weekly, anchor), at(2024, 3, 17));
    }

    #[test]
    fn test_weekly_crosses_year_boundary() {
        assert_eq!(next_due(Frequency::Weekly, at(2024, 12, 28)), at(2025, 1, 4));
        assert_eq!(next_due(Frequency::Weekly, at(2025, 2, 25)), at(2025, 3, 4));
    }

    #[test]
    fn test_month_end_overflow_rolls_forward() {
        assert_eq!(next_due(Frequency::Monthly, at(2023, 1, 31)), at(2023, 3, 3));
        assert_eq!(next_due(Frequency::Monthly, at(2024, 1, 31)), at(2024, 3, 2));
        assert_eq!(next_due(Frequency::Monthly, at(2024, 3, 31)), at(2024, 5, 1));
        assert_eq!(next_due(Frequency::Monthly, at(2024, 12, 15)), at(2025, 1, 15));
    }

    #[test]
    fn test_quarterly_and_yearly() {
        assert_eq!(next_due(Frequency::Quarterly, at(2024, 11, 30)), at(2025, 3, 2));
        assert_eq!(next_due(Frequency::Quarterly, at(2024, 1, 15)), at(2024, 4, 15));
        assert_eq!(next_due(Frequency::Yearly, at(2024, 2, 29)), at(2025, 3, 1));
        assert_eq!(next_due(Frequency::Yearly, at(2023, 6, 1)), at(2024, 6, 1));
    }

    #[test]
    fn test_monthly_is_deterministic() {
        let anchor = at(2025, 1, 31);
        let first = next_due(Frequency::Monthly, anchor);
        for _ in 0..10 {
            assert_eq!(next_due(Frequency::Monthly, anchor), first);
        }
    }

    #[test]
    fn test_time_of_day_preserved() {
        let anchor = Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap();
        let next = next_due(Frequency::Monthly, anchor);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 7, 1, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_raw_text_defaults_to_one_month() {
        let anchor = at(2024, 4, 10);
        assert_eq!(next_due_from_raw(Some("fortnightly-ish"), anchor), at(2024, 5, 10));
        assert_eq!(next_due_from_raw(None, anchor), at(2024, 5, 10));
        assert_eq!(next_due_from_raw(Some("6 weeks"), anchor), at(2024, 4, 17));
    }

    #[test]
    fn test_saturates_instead_of_failing() {
        let next = next_due(Frequency::Yearly, DateTime::<Utc>::MAX_UTC);
        assert_eq!(next, DateTime::<Utc>::MAX_UTC);
    }
}
