//! Occurrence expansion.
//!
//! `Occurrences` walks a series period by period starting at the anchor and
//! counts every emitted date, so the AfterCount budget and the OnDate cut-off
//! are the same no matter which window a caller asks for. `generate` and
//! `next_after` are thin filters over it.

use std::collections::VecDeque;

use chrono::{DateTime, Datelike, Days, Utc};

use super::calendar::{add_months, at_time_of, clamped_date, week_start};
use crate::domain::{EndCondition, Frequency, RecurrenceRule};

/// Lazy, strictly increasing sequence of every occurrence in a series
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    rule: &'a RecurrenceRule,
    anchor: DateTime<Utc>,
    period: u64,
    pending: VecDeque<DateTime<Utc>>,
    emitted: u32,
    exhausted: bool,
}

impl<'a> Occurrences<'a> {
    pub fn new(rule: &'a RecurrenceRule, anchor: DateTime<Utc>) -> Self {
        Self {
            rule,
            anchor,
            period: 0,
            pending: VecDeque::new(),
            emitted: 0,
            exhausted: false,
        }
    }

    /// Number of occurrences yielded so far
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    /// Candidate dates of the k-th period, ascending; `None` once chrono's
    /// range is exceeded
    fn period_candidates(&self, k: u64) -> Option<Vec<DateTime<Utc>>> {
        let step = k.checked_mul(u64::from(self.rule.interval()))?;
        let anchor = self.anchor;

        match self.rule.frequency() {
            Frequency::Daily => Some(vec![anchor.checked_add_days(Days::new(step))?]),
            Frequency::Weekly if self.rule.weekdays().is_empty() => {
                Some(vec![anchor.checked_add_days(Days::new(step.checked_mul(7)?))?])
            }
            Frequency::Weekly => {
                let start = week_start(anchor.date_naive())?.checked_add_days(Days::new(step.checked_mul(7)?))?;
                self.rule
                    .weekdays()
                    .iter()
                    .map(|day| {
                        start
                            .checked_add_days(Days::new(u64::from(day.num_days_from_sunday())))
                            .map(|date| at_time_of(date, anchor))
                    })
                    .collect()
            }
            Frequency::Monthly => {
                let (year, month) = add_months(anchor.year(), anchor.month0(), step)?;
                let day = self.rule.month_day().unwrap_or(anchor.day());
                Some(vec![at_time_of(clamped_date(year, month, day)?, anchor)])
            }
            Frequency::Yearly => {
                let year = i32::try_from(i64::from(anchor.year()).checked_add(i64::try_from(step).ok()?)?).ok()?;
                Some(vec![at_time_of(clamped_date(year, anchor.month(), anchor.day())?, anchor)])
            }
        }
    }

    fn count_reached(&self) -> bool {
        matches!(self.rule.end_condition(), EndCondition::AfterCount(n) if self.emitted >= n)
    }

    fn past_end_date(&self, candidate: DateTime<Utc>) -> bool {
        matches!(self.rule.end_condition(), EndCondition::OnDate(until) if candidate.date_naive() > until)
    }
}

impl Iterator for Occurrences<'_> {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.exhausted {
                return None;
            }
            if self.count_reached() {
                self.exhausted = true;
                return None;
            }

            if let Some(candidate) = self.pending.pop_front() {
                // Earlier days of the anchor's own week or month
                if candidate < self.anchor {
                    continue;
                }
                if self.past_end_date(candidate) {
                    self.exhausted = true;
                    return None;
                }
                self.emitted += 1;
                return Some(candidate);
            }

            match self.period_candidates(self.period) {
                Some(candidates) => {
                    self.pending.extend(candidates);
                    match self.period.checked_add(1) {
                        Some(next) => self.period = next,
                        None => self.exhausted = true,
                    }
                }
                None => self.exhausted = true,
            }
        }
    }
}

/// Every occurrence of `rule` anchored at `anchor`, lazily
pub fn occurrences(rule: &RecurrenceRule, anchor: DateTime<Utc>) -> Occurrences<'_> {
    Occurrences::new(rule, anchor)
}

/// Occurrences within `[window_start, window_end]`, both ends inclusive.
///
/// Ordered and distinct. Splitting a window at any instant and merging the
/// two results gives the same dates as one call over the whole window.
pub fn generate(
    rule: &RecurrenceRule,
    anchor: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    if window_start > window_end {
        return Vec::new();
    }
    occurrences(rule, anchor)
        .skip_while(|d| *d < window_start)
        .take_while(|d| *d <= window_end)
        .collect()
}

/// First occurrence strictly after `after`, if the series has one
pub fn next_after(rule: &RecurrenceRule, anchor: DateTime<Utc>, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    occurrences(rule, anchor).find(|d| *d > after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta, TimeZone, Weekday};

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    fn far_future() -> DateTime<Utc> {
        DateTime::<Utc>::MAX_UTC
    }

    fn rule(frequency: Frequency) -> crate::domain::RecurrenceRuleBuilder {
        RecurrenceRule::builder(frequency)
    }

    #[test]
    fn test_daily_spacing_matches_interval() {
        for interval in 1..=5 {
            let r = rule(Frequency::Daily).interval(interval).build().unwrap();
            let dates = generate(&r, at(2024, 1, 1), at(2024, 1, 1), at(2024, 3, 1));
            assert!(dates.len() > 2);
            assert_eq!(dates[0], at(2024, 1, 1));
            for pair in dates.windows(2) {
                assert_eq!(pair[1] - pair[0], TimeDelta::days(interval));
            }
        }
    }

    #[test]
    fn test_weekly_without_weekdays_steps_whole_weeks() {
        let r = rule(Frequency::Weekly).interval(2).build().unwrap();
        let dates = generate(&r, at(2024, 1, 3), at(2024, 1, 1), at(2024, 2, 15));
        assert_eq!(dates, vec![at(2024, 1, 3), at(2024, 1, 17), at(2024, 1, 31), at(2024, 2, 14)]);
    }

    #[test]
    fn test_weekly_monday_wednesday_from_monday() {
        // 2024-01-01 is a Monday
        let r = rule(Frequency::Weekly).weekdays([1, 3]).build().unwrap();
        let dates: Vec<_> = occurrences(&r, at(2024, 1, 1)).take(4).collect();
        assert_eq!(dates, vec![at(2024, 1, 1), at(2024, 1, 3), at(2024, 1, 8), at(2024, 1, 10)]);
    }

    #[test]
    fn test_weekly_single_weekday_includes_anchor() {
        let r = rule(Frequency::Weekly).weekdays([1]).build().unwrap();
        let first = occurrences(&r, at(2024, 1, 1)).next();
        assert_eq!(first, Some(at(2024, 1, 1)));
    }

    #[test]
    fn test_weekly_skips_days_before_anchor_in_first_week() {
        // Anchor on Wednesday; Monday of that week is not an occurrence
        let r = rule(Frequency::Weekly).weekdays([1, 3, 5]).build().unwrap();
        let dates: Vec<_> = occurrences(&r, at(2024, 1, 3)).take(3).collect();
        assert_eq!(dates, vec![at(2024, 1, 3), at(2024, 1, 5), at(2024, 1, 8)]);
    }

    #[test]
    fn test_weekly_anchor_not_on_requested_day() {
        // Saturday anchor, Mondays only: first occurrence is the following Monday
        let r = rule(Frequency::Weekly).weekdays([1]).build().unwrap();
        let first = occurrences(&r, at(2024, 1, 6)).next();
        assert_eq!(first, Some(at(2024, 1, 8)));
    }

    #[test]
    fn test_weekly_interval_two_with_weekdays() {
        let r = rule(Frequency::Weekly).interval(2).weekdays([2, 4]).build().unwrap();
        let dates: Vec<_> = occurrences(&r, at(2024, 1, 2)).take(4).collect();
        assert_eq!(dates, vec![at(2024, 1, 2), at(2024, 1, 4), at(2024, 1, 16), at(2024, 1, 18)]);
        assert!(
            occurrences(&r, at(2024, 1, 2))
                .take(20)
                .all(|d| d.weekday() == Weekday::Tue || d.weekday() == Weekday::Thu)
        );
    }

    #[test]
    fn test_monthly_clamps_to_month_end() {
        let r = rule(Frequency::Monthly).build().unwrap();
        let dates: Vec<_> = occurrences(&r, at(2023, 1, 31)).take(5).collect();
        assert_eq!(
            dates,
            vec![at(2023, 1, 31), at(2023, 2, 28), at(2023, 3, 31), at(2023, 4, 30), at(2023, 5, 31)]
        );
    }

    #[test]
    fn test_monthly_day_31_february_every_year() {
        let r = rule(Frequency::Monthly).month_day(31).build().unwrap();
        for year in 2020..=2032 {
            let feb = occurrences(&r, at(year, 1, 31)).nth(1).unwrap();
            let expected_day = if NaiveDate::from_ymd_opt(year, 2, 29).is_some() { 29 } else { 28 };
            assert_eq!(feb, at(year, 2, expected_day), "year {year}");
        }
    }

    #[test]
    fn test_monthly_month_day_before_anchor_day_skips_first_month() {
        let r = rule(Frequency::Monthly).month_day(5).build().unwrap();
        let dates: Vec<_> = occurrences(&r, at(2024, 1, 20)).take(2).collect();
        assert_eq!(dates, vec![at(2024, 2, 5), at(2024, 3, 5)]);
    }

    #[test]
    fn test_monthly_interval_three() {
        let r = rule(Frequency::Monthly).interval(3).build().unwrap();
        let dates: Vec<_> = occurrences(&r, at(2024, 11, 15)).take(3).collect();
        assert_eq!(dates, vec![at(2024, 11, 15), at(2025, 2, 15), at(2025, 5, 15)]);
    }

    #[test]
    fn test_yearly_leap_day_clamps() {
        let r = rule(Frequency::Yearly).build().unwrap();
        let dates: Vec<_> = occurrences(&r, at(2024, 2, 29)).take(5).collect();
        assert_eq!(
            dates,
            vec![at(2024, 2, 29), at(2025, 2, 28), at(2026, 2, 28), at(2027, 2, 28), at(2028, 2, 29)]
        );
    }

    #[test]
    fn test_after_count_unbounded_window() {
        for n in 1..=12 {
            for frequency in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly, Frequency::Yearly] {
                let r = rule(frequency).count(n).build().unwrap();
                let dates = generate(&r, at(2024, 1, 1), at(2024, 1, 1), far_future());
                assert_eq!(dates.len(), n as usize, "{frequency} count {n}");
            }
        }
    }

    #[test]
    fn test_after_count_weekly_weekdays_counts_each_day() {
        let r = rule(Frequency::Weekly).weekdays([1, 3, 5]).count(4).build().unwrap();
        let dates = generate(&r, at(2024, 1, 1), at(2024, 1, 1), far_future());
        assert_eq!(dates, vec![at(2024, 1, 1), at(2024, 1, 3), at(2024, 1, 5), at(2024, 1, 8)]);
    }

    #[test]
    fn test_after_count_resumes_across_windows() {
        let r = rule(Frequency::Daily).count(3).build().unwrap();
        let anchor = at(2024, 1, 1);
        // Two occurrences already materialized: the anchor and the day after
        let materialized = generate(&r, anchor, anchor, at(2024, 1, 2));
        assert_eq!(materialized.len(), 2);

        let after_second = at(2024, 1, 2) + TimeDelta::seconds(1);
        let next = generate(&r, anchor, after_second, far_future());
        assert_eq!(next, vec![at(2024, 1, 3)]);

        let after_third = at(2024, 1, 3) + TimeDelta::seconds(1);
        assert!(generate(&r, anchor, after_third, far_future()).is_empty());
        assert_eq!(next_after(&r, anchor, at(2024, 1, 3)), None);
    }

    #[test]
    fn test_on_date_is_inclusive() {
        let until = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let r = rule(Frequency::Daily).until(until).build().unwrap();
        let dates = generate(&r, at(2024, 1, 1), at(2024, 1, 1), far_future());
        assert_eq!(dates.len(), 5);
        assert_eq!(dates.last(), Some(&at(2024, 1, 5)));
    }

    #[test]
    fn test_on_date_before_anchor_yields_nothing() {
        let until = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let r = rule(Frequency::Daily).until(until).build().unwrap();
        assert_eq!(occurrences(&r, at(2024, 1, 1)).next(), None);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let r = rule(Frequency::Daily).build().unwrap();
        let dates = generate(&r, at(2024, 1, 1), at(2024, 1, 3), at(2024, 1, 5));
        assert_eq!(dates, vec![at(2024, 1, 3), at(2024, 1, 4), at(2024, 1, 5)]);
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let r = rule(Frequency::Daily).build().unwrap();
        assert!(generate(&r, at(2024, 1, 1), at(2024, 2, 1), at(2024, 1, 1)).is_empty());
    }

    #[test]
    fn test_window_before_anchor_is_empty() {
        let r = rule(Frequency::Daily).build().unwrap();
        assert!(generate(&r, at(2024, 6, 1), at(2024, 1, 1), at(2024, 5, 31)).is_empty());
    }

    #[test]
    fn test_window_composability() {
        let anchor = at(2024, 1, 31);
        let rules = vec![
            rule(Frequency::Daily).interval(3).build().unwrap(),
            rule(Frequency::Weekly).weekdays([0, 2, 6]).build().unwrap(),
            rule(Frequency::Monthly).month_day(30).count(7).build().unwrap(),
            rule(Frequency::Yearly).build().unwrap(),
            rule(Frequency::Weekly)
                .interval(3)
                .until(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap())
                .build()
                .unwrap(),
        ];
        let t0 = at(2024, 1, 1);
        let t2 = at(2027, 1, 1);
        let splits = [
            t0,
            at(2024, 2, 29),
            at(2024, 3, 3),
            at(2024, 7, 31) + TimeDelta::minutes(1),
            at(2025, 1, 31),
            t2,
        ];

        for r in &rules {
            let whole = generate(r, anchor, t0, t2);
            for t1 in splits {
                let mut merged = generate(r, anchor, t0, t1);
                merged.extend(generate(r, anchor, t1, t2));
                merged.dedup();
                assert_eq!(merged, whole, "rule {:?} split at {}", r, t1);
            }
        }
    }

    #[test]
    fn test_output_strictly_increasing() {
        let r = rule(Frequency::Weekly).weekdays([0, 1, 2, 3, 4, 5, 6]).build().unwrap();
        let dates = generate(&r, at(2024, 1, 1), at(2024, 1, 1), at(2024, 3, 1));
        assert_eq!(dates.len(), 61);
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_next_after_is_strict() {
        let r = rule(Frequency::Daily).build().unwrap();
        assert_eq!(next_after(&r, at(2024, 1, 1), at(2024, 1, 1)), Some(at(2024, 1, 2)));
        assert_eq!(
            next_after(&r, at(2024, 1, 1), at(2024, 1, 1) - TimeDelta::seconds(1)),
            Some(at(2024, 1, 1))
        );
    }

    #[test]
    fn test_next_after_for_never_ending_rule_far_ahead() {
        let r = rule(Frequency::Monthly).build().unwrap();
        assert_eq!(next_after(&r, at(2024, 1, 15), at(2030, 6, 20)), Some(at(2030, 7, 15)));
    }

    #[test]
    fn test_overflow_ends_sequence() {
        let r = rule(Frequency::Yearly).interval(100_000).build().unwrap();
        let dates: Vec<_> = occurrences(&r, at(2024, 1, 1)).take(10).collect();
        assert!(dates.len() < 10);
        assert_eq!(dates[0], at(2024, 1, 1));
    }

    #[test]
    fn test_time_of_day_preserved() {
        let r = rule(Frequency::Weekly).weekdays([4]).build().unwrap();
        for d in occurrences(&r, at(2024, 1, 1)).take(5) {
            assert_eq!(d.time(), at(2024, 1, 1).time());
            assert_eq!(d.weekday(), Weekday::Thu);
        }
    }

    #[test]
    fn test_emitted_counter() {
        let r = rule(Frequency::Daily).build().unwrap();
        let mut iter = occurrences(&r, at(2024, 1, 1));
        iter.next();
        iter.next();
        assert_eq!(iter.emitted(), 2);
    }
}
