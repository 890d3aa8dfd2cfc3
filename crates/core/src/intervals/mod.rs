//! Interval algebra over closed calendar-date intervals.
//!
//! Pure and deterministic: gap-fill correctness is a property of this module
//! alone and is tested without any I/O. The algebra operates on calendar
//! dates, not trading days - the engine trusts providers to return no bar for
//! non-trading dates, and a calendar date absent from both the cache and a
//! fetch is a legitimately-empty day, not an error.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;

/// A closed date interval `[start, end]`. Both endpoints are included.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DateInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateInterval {
    /// Build an interval. `start` must not be after `end`; the engine
    /// validates request bounds before any interval is constructed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "interval start after end");
        Self { start, end }
    }

    /// A single-day interval `[day, day]`.
    pub fn single(day: NaiveDate) -> Self {
        Self::new(day, day)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Number of calendar days covered, endpoints included.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Iterate every calendar day in the interval, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Union of two intervals when they overlap or touch; `None` when a gap
    /// separates them.
    pub fn union(&self, other: &DateInterval) -> Option<DateInterval> {
        let (first, second) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        let adjacent = second
            .start
            .pred_opt()
            .map(|d| d <= first.end)
            .unwrap_or(false);
        if second.start <= first.end || adjacent {
            Some(DateInterval::new(first.start, first.end.max(second.end)))
        } else {
            None
        }
    }

    /// Subtract `other`, returning the 0, 1 or 2 closed intervals of `self`
    /// that remain.
    pub fn subtract(&self, other: &DateInterval) -> Vec<DateInterval> {
        if other.end < self.start || other.start > self.end {
            return vec![*self];
        }
        let mut parts = Vec::new();
        if other.start > self.start {
            if let Some(left_end) = other.start.pred_opt() {
                parts.push(DateInterval::new(self.start, left_end));
            }
        }
        if other.end < self.end {
            if let Some(right_start) = other.end.succ_opt() {
                parts.push(DateInterval::new(right_start, self.end));
            }
        }
        parts
    }
}

impl fmt::Display for DateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// The minimal list of closed sub-intervals of `requested` not covered by
/// `covered`: maximal-length, ascending, never overlapping. Dates in
/// `covered` outside the requested interval are ignored.
///
/// An empty `covered` set yields `[requested]`; a fully covering set yields
/// an empty list. A single uncovered day between two covered dates comes back
/// as `[day, day]`.
pub fn missing_intervals(
    requested: DateInterval,
    covered: &BTreeSet<NaiveDate>,
) -> Vec<DateInterval> {
    let mut gaps = Vec::new();
    let mut gap_start: Option<NaiveDate> = None;

    for day in requested.days() {
        if covered.contains(&day) {
            if let Some(start) = gap_start.take() {
                gaps.push(DateInterval::new(start, day.pred_opt().unwrap_or(start)));
            }
        } else if gap_start.is_none() {
            gap_start = Some(day);
        }
    }

    if let Some(start) = gap_start {
        gaps.push(DateInterval::new(start, requested.end));
    }

    gaps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn covered(days: &[NaiveDate]) -> BTreeSet<NaiveDate> {
        days.iter().copied().collect()
    }

    #[test]
    fn empty_cover_returns_whole_request() {
        let requested = DateInterval::new(d(2024, 1, 2), d(2024, 1, 5));
        let gaps = missing_intervals(requested, &BTreeSet::new());
        assert_eq!(gaps, vec![requested]);
    }

    #[test]
    fn full_cover_returns_nothing() {
        let requested = DateInterval::new(d(2024, 1, 2), d(2024, 1, 5));
        let days = covered(&[d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4), d(2024, 1, 5)]);
        assert!(missing_intervals(requested, &days).is_empty());
    }

    #[test]
    fn interior_gap_between_covered_endpoints() {
        // Cached endpoints only; the gap is the closed middle.
        let requested = DateInterval::new(d(2024, 1, 2), d(2024, 1, 5));
        let days = covered(&[d(2024, 1, 2), d(2024, 1, 5)]);
        assert_eq!(
            missing_intervals(requested, &days),
            vec![DateInterval::new(d(2024, 1, 3), d(2024, 1, 4))]
        );
    }

    #[test]
    fn single_day_gap_is_a_degenerate_interval() {
        let requested = DateInterval::new(d(2024, 3, 11), d(2024, 3, 13));
        let days = covered(&[d(2024, 3, 11), d(2024, 3, 13)]);
        assert_eq!(
            missing_intervals(requested, &days),
            vec![DateInterval::single(d(2024, 3, 12))]
        );
    }

    #[test]
    fn uncovered_edges_produce_leading_and_trailing_gaps() {
        let requested = DateInterval::new(d(2024, 2, 1), d(2024, 2, 7));
        let days = covered(&[d(2024, 2, 3), d(2024, 2, 4)]);
        assert_eq!(
            missing_intervals(requested, &days),
            vec![
                DateInterval::new(d(2024, 2, 1), d(2024, 2, 2)),
                DateInterval::new(d(2024, 2, 5), d(2024, 2, 7)),
            ]
        );
    }

    #[test]
    fn mid_month_gap_example() {
        // Cached Jan 1-10 and Jan 20-31, requested the whole month: the gap
        // is exactly Jan 11-19.
        let requested = DateInterval::new(d(2024, 1, 1), d(2024, 1, 31));
        let mut days = BTreeSet::new();
        for day in DateInterval::new(d(2024, 1, 1), d(2024, 1, 10)).days() {
            days.insert(day);
        }
        for day in DateInterval::new(d(2024, 1, 20), d(2024, 1, 31)).days() {
            days.insert(day);
        }
        assert_eq!(
            missing_intervals(requested, &days),
            vec![DateInterval::new(d(2024, 1, 11), d(2024, 1, 19))]
        );
    }

    #[test]
    fn covered_dates_outside_request_are_ignored() {
        let requested = DateInterval::new(d(2024, 1, 10), d(2024, 1, 12));
        let days = covered(&[d(2024, 1, 1), d(2024, 1, 31)]);
        assert_eq!(missing_intervals(requested, &days), vec![requested]);
    }

    #[test]
    fn gaps_are_ascending_and_disjoint() {
        let requested = DateInterval::new(d(2024, 1, 1), d(2024, 1, 15));
        let days = covered(&[d(2024, 1, 2), d(2024, 1, 5), d(2024, 1, 9), d(2024, 1, 14)]);
        let gaps = missing_intervals(requested, &days);
        for pair in gaps.windows(2) {
            assert!(pair[0].end < pair[1].start);
        }
        let total: i64 = gaps.iter().map(|g| g.len_days()).sum();
        assert_eq!(total, requested.len_days() - days.len() as i64);
    }

    #[test]
    fn single_day_request() {
        let requested = DateInterval::single(d(2024, 6, 3));
        assert_eq!(missing_intervals(requested, &BTreeSet::new()), vec![requested]);
        assert!(missing_intervals(requested, &covered(&[d(2024, 6, 3)])).is_empty());
    }

    #[test]
    fn len_days_counts_endpoints() {
        assert_eq!(DateInterval::single(d(2024, 1, 1)).len_days(), 1);
        assert_eq!(DateInterval::new(d(2024, 1, 1), d(2024, 1, 31)).len_days(), 31);
    }

    #[test]
    fn union_merges_overlapping_and_adjacent() {
        let a = DateInterval::new(d(2024, 1, 1), d(2024, 1, 10));
        let b = DateInterval::new(d(2024, 1, 8), d(2024, 1, 15));
        assert_eq!(a.union(&b), Some(DateInterval::new(d(2024, 1, 1), d(2024, 1, 15))));

        let adjacent = DateInterval::new(d(2024, 1, 11), d(2024, 1, 12));
        assert_eq!(
            a.union(&adjacent),
            Some(DateInterval::new(d(2024, 1, 1), d(2024, 1, 12)))
        );

        let separated = DateInterval::new(d(2024, 1, 13), d(2024, 1, 14));
        assert_eq!(a.union(&separated), None);
    }

    #[test]
    fn subtract_splits_middle_and_trims_edges() {
        let base = DateInterval::new(d(2024, 1, 1), d(2024, 1, 31));

        let middle = DateInterval::new(d(2024, 1, 10), d(2024, 1, 20));
        assert_eq!(
            base.subtract(&middle),
            vec![
                DateInterval::new(d(2024, 1, 1), d(2024, 1, 9)),
                DateInterval::new(d(2024, 1, 21), d(2024, 1, 31)),
            ]
        );

        let prefix = DateInterval::new(d(2023, 12, 1), d(2024, 1, 15));
        assert_eq!(
            base.subtract(&prefix),
            vec![DateInterval::new(d(2024, 1, 16), d(2024, 1, 31))]
        );

        let disjoint = DateInterval::new(d(2024, 2, 1), d(2024, 2, 2));
        assert_eq!(base.subtract(&disjoint), vec![base]);

        assert!(base.subtract(&base).is_empty());
    }
}
