//! Calendar arithmetic used by the generator.
//!
//! All helpers return `None` instead of overflowing chrono's date range.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};

/// Number of days in `month` (1-12) of `year`
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year.checked_add(1)?, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|last| last.day())
}

/// `year-month-day`, with `day` clamped to the month's last day
pub fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last))
}

/// Year and month (1-12) reached by moving `months` forward from `year`/`month0` (0-11)
pub fn add_months(year: i32, month0: u32, months: u64) -> Option<(i32, u32)> {
    let total = i64::from(year)
        .checked_mul(12)?
        .checked_add(i64::from(month0))?
        .checked_add(i64::try_from(months).ok()?)?;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;
    Some((year, month))
}

/// Sunday on or before `date`
pub fn week_start(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_sunday())))
}

/// `date` at the anchor's time of day
pub fn at_time_of(date: NaiveDate, anchor: DateTime<Utc>) -> DateTime<Utc> {
    date.and_time(anchor.time()).and_utc()
}
