//! Calendar arithmetic and schedule-date resolution.
//!
//! The calendar owns the leap-year policy of a run and turns schedule dates
//! ([`SimDate`]) into calendar dates the clock can be compared against.
//!
//! # Resolution rules
//!
//! - Absolute dates resolve to themselves.
//! - A relative date resolves against a base year: `base + year_offset`.
//! - Within a running process, the next relative date resolves against the
//!   previously applied date: same year if its day-of-year lies strictly
//!   after the previous one, otherwise the following year. The year offset
//!   plays no part in this rule.

use chrono::{Datelike, NaiveDate};
use furrow_types::{LeapYearPolicy, RelativeDate, SimDate};
use tracing::warn;

/// Day-of-year of February 28.
const FEB_28_DAY_OF_YEAR: u32 = 59;

/// Errors that can occur while resolving schedule dates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    /// The date does not exist in the year it was resolved into.
    #[error("{date} cannot be resolved in year {year}")]
    Unresolvable {
        /// The schedule date.
        date: SimDate,
        /// The year it was resolved into.
        year: i32,
    },

    /// Year arithmetic left the supported range.
    #[error("year arithmetic overflow")]
    YearOverflow,
}

/// Leap-year aware calendar for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calendar {
    policy: LeapYearPolicy,
}

impl Calendar {
    /// Create a calendar with the given leap-year policy.
    pub const fn new(policy: LeapYearPolicy) -> Self {
        Self { policy }
    }

    /// The leap-year policy of this calendar.
    pub const fn policy(&self) -> LeapYearPolicy {
        self.policy
    }

    /// Gregorian leap-year test, independent of the policy.
    pub fn is_leap_year(year: i32) -> bool {
        NaiveDate::from_ymd_opt(year, 2, 29).is_some()
    }

    /// Number of day-of-year slots in `year` under this policy.
    pub fn days_in_year(&self, year: i32) -> u32 {
        match self.policy {
            LeapYearPolicy::Gregorian if Self::is_leap_year(year) => 366,
            _ => 365,
        }
    }

    /// Day-of-year (1-based) of a calendar date under this policy.
    ///
    /// With [`LeapYearPolicy::IgnoreLeapDays`], February 29 shares slot 59
    /// with February 28 and every later day moves down by one.
    pub fn day_of_year(&self, date: NaiveDate) -> u32 {
        let ordinal = date.ordinal();
        match self.policy {
            LeapYearPolicy::IgnoreLeapDays
                if Self::is_leap_year(date.year()) && ordinal > FEB_28_DAY_OF_YEAR =>
            {
                ordinal.saturating_sub(1)
            }
            _ => ordinal,
        }
    }

    /// Calendar date occupying slot `day_of_year` in `year`.
    pub fn date_for_day_of_year(&self, year: i32, day_of_year: u32) -> Option<NaiveDate> {
        let ordinal = match self.policy {
            LeapYearPolicy::IgnoreLeapDays
                if Self::is_leap_year(year) && day_of_year > FEB_28_DAY_OF_YEAR =>
            {
                day_of_year.checked_add(1)?
            }
            _ => day_of_year,
        };
        NaiveDate::from_yo_opt(year, ordinal)
    }

    /// Days from `from` to `to`. February 29 is not counted when leap days
    /// are ignored.
    pub fn days_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        let raw = to.signed_duration_since(from).num_days();
        if self.policy == LeapYearPolicy::Gregorian {
            return raw;
        }
        let (lo, hi, sign) = if from <= to {
            (from, to, 1_i64)
        } else {
            (to, from, -1_i64)
        };
        let leap_days = (lo.year()..=hi.year())
            .filter_map(|y| NaiveDate::from_ymd_opt(y, 2, 29))
            .filter(|d| *d > lo && *d <= hi)
            .count();
        let leap_days = i64::try_from(leap_days).unwrap_or(0);
        raw.saturating_sub(leap_days.saturating_mul(sign))
    }

    /// Shift a date by whole years, mapping February 29 to February 28 when
    /// the target year has no leap day.
    pub fn add_years(date: NaiveDate, years: i32) -> Result<NaiveDate, CalendarError> {
        let year = date
            .year()
            .checked_add(years)
            .ok_or(CalendarError::YearOverflow)?;
        date.with_year(year)
            .or_else(|| NaiveDate::from_ymd_opt(year, date.month(), 28))
            .ok_or(CalendarError::YearOverflow)
    }

    /// Resolve a schedule date against a base year.
    ///
    /// Relative dates land in `base_year + year_offset`.
    pub fn resolve(date: SimDate, base_year: i32) -> Result<NaiveDate, CalendarError> {
        match date {
            SimDate::Absolute(d) => Ok(d),
            SimDate::Relative(r) => r.resolve(base_year).ok_or(CalendarError::Unresolvable {
                date,
                year: base_year,
            }),
        }
    }

    /// Whether a relative date, placed in the year of `previous`, falls on or
    /// before it in day-of-year terms and so belongs to the following year.
    pub fn rolls_over(&self, next: RelativeDate, previous: NaiveDate) -> bool {
        next.in_year(previous.year())
            .is_none_or(|candidate| self.day_of_year(candidate) <= self.day_of_year(previous))
    }

    /// Resolve `next` as the date following `previous` within a process.
    ///
    /// `previous_key` is the schedule key that produced `previous`; it is
    /// only used to spot year offsets the rollover rule cannot express.
    pub fn resolve_after(
        &self,
        next: SimDate,
        previous_key: SimDate,
        previous: NaiveDate,
    ) -> Result<NaiveDate, CalendarError> {
        let SimDate::Relative(relative) = next else {
            return Self::resolve(next, previous.year());
        };

        let rollover = self.rolls_over(relative, previous);
        let year = if rollover {
            previous
                .year()
                .checked_add(1)
                .ok_or(CalendarError::YearOverflow)?
        } else {
            previous.year()
        };

        if let SimDate::Relative(prev_rel) = previous_key {
            let offset_gap = relative
                .year_offset()
                .saturating_sub(prev_rel.year_offset());
            let applied_gap = u32::from(rollover);
            if offset_gap > applied_gap {
                warn!(
                    next = %next,
                    previous = %previous_key,
                    offset_gap,
                    applied_gap,
                    "Year offset gap exceeds what day-of-year rollover resolves; resolving by rollover"
                );
            }
        }

        relative
            .in_year(year)
            .ok_or(CalendarError::Unresolvable { date: next, year })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rel(s: &str) -> SimDate {
        s.parse().unwrap()
    }

    #[test]
    fn day_of_year_respects_policy() {
        let gregorian = Calendar::new(LeapYearPolicy::Gregorian);
        let ignore = Calendar::new(LeapYearPolicy::IgnoreLeapDays);

        assert_eq!(gregorian.day_of_year(ymd(2020, 3, 15)), 75);
        assert_eq!(ignore.day_of_year(ymd(2020, 3, 15)), 74);
        assert_eq!(ignore.day_of_year(ymd(2021, 3, 15)), 74);
        assert_eq!(ignore.day_of_year(ymd(2020, 2, 29)), 59);
        assert_eq!(ignore.day_of_year(ymd(2020, 2, 28)), 59);
    }

    #[test]
    fn days_in_year_respects_policy() {
        assert_eq!(Calendar::new(LeapYearPolicy::Gregorian).days_in_year(2020), 366);
        assert_eq!(Calendar::new(LeapYearPolicy::Gregorian).days_in_year(2021), 365);
        assert_eq!(Calendar::new(LeapYearPolicy::IgnoreLeapDays).days_in_year(2020), 365);
    }

    #[test]
    fn date_for_day_of_year_inverts_day_of_year() {
        for policy in [LeapYearPolicy::Gregorian, LeapYearPolicy::IgnoreLeapDays] {
            let cal = Calendar::new(policy);
            let date = ymd(2024, 10, 3);
            let doy = cal.day_of_year(date);
            assert_eq!(cal.date_for_day_of_year(2024, doy), Some(date));
        }
    }

    #[test]
    fn days_between_skips_leap_day_when_ignored() {
        let from = ymd(2020, 2, 1);
        let to = ymd(2020, 3, 1);
        assert_eq!(Calendar::new(LeapYearPolicy::Gregorian).days_between(from, to), 29);
        assert_eq!(Calendar::new(LeapYearPolicy::IgnoreLeapDays).days_between(from, to), 28);
        assert_eq!(Calendar::new(LeapYearPolicy::IgnoreLeapDays).days_between(to, from), -28);
    }

    #[test]
    fn add_years_clamps_leap_day() {
        assert_eq!(Calendar::add_years(ymd(2020, 2, 29), 1).unwrap(), ymd(2021, 2, 28));
        assert_eq!(Calendar::add_years(ymd(2020, 7, 1), 1).unwrap(), ymd(2021, 7, 1));
    }

    #[test]
    fn resolve_adds_year_offset() {
        assert_eq!(Calendar::resolve(rel("+1:07-31"), 2020).unwrap(), ymd(2021, 7, 31));
        assert_eq!(Calendar::resolve(rel("2019-05-05"), 2020).unwrap(), ymd(2019, 5, 5));
    }

    #[test]
    fn next_date_rolls_over_when_not_later_in_year() {
        let cal = Calendar::default();
        let sowing = ymd(2020, 9, 20);
        let resolved = cal
            .resolve_after(rel("+1:07-31"), rel("09-20"), sowing)
            .unwrap();
        assert_eq!(resolved, ymd(2021, 7, 31));

        let later_same_year = cal
            .resolve_after(rel("10-05"), rel("09-20"), sowing)
            .unwrap();
        assert_eq!(later_same_year, ymd(2020, 10, 5));
    }

    #[test]
    fn same_day_of_year_rolls_over() {
        let cal = Calendar::default();
        let resolved = cal
            .resolve_after(rel("+1:09-20"), rel("09-20"), ymd(2020, 9, 20))
            .unwrap();
        assert_eq!(resolved, ymd(2021, 9, 20));
    }

    #[test]
    fn ignore_leap_days_compares_by_slot() {
        let cal = Calendar::new(LeapYearPolicy::IgnoreLeapDays);
        // Feb 29 and Feb 28 share a slot, so Feb 28 after Feb 29 rolls over.
        let resolved = cal
            .resolve_after(rel("02-28"), rel("2020-02-29"), ymd(2020, 2, 29))
            .unwrap();
        assert_eq!(resolved, ymd(2021, 2, 28));
    }
}
