//! Simulation dates as they appear in management schedules.
//!
//! A schedule date is either an absolute calendar date (`2021-04-15`) or a
//! relative date that names only month and day plus a year offset
//! (`04-15`, `+1:07-31`). Relative dates repeat every rotation cycle and
//! are resolved against the clock by the calendar in `furrow-core`.
//!
//! # String forms
//!
//! | Form          | Meaning                                   |
//! |---------------|-------------------------------------------|
//! | `YYYY-MM-DD`  | Absolute date                             |
//! | `MM-DD`       | Relative date, year offset 0              |
//! | `+N:MM-DD`    | Relative date, year offset `N`            |

use core::fmt;
use core::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Errors produced when parsing or constructing schedule dates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateParseError {
    /// The string matched none of the accepted forms.
    #[error("unrecognised date `{input}` (expected YYYY-MM-DD, MM-DD or +N:MM-DD)")]
    Malformed {
        /// The rejected input.
        input: String,
    },

    /// Month or day out of range, or February 29 on a relative date.
    #[error("month {month} / day {day} is not a valid relative date")]
    InvalidMonthDay {
        /// Month component.
        month: u32,
        /// Day component.
        day: u32,
    },
}

/// How leap days are counted when computing day-of-year values.
///
/// The policy is fixed for a whole run. Under [`IgnoreLeapDays`] every year
/// has 365 day-of-year slots, so a relative date maps to the same
/// day-of-year in every year.
///
/// [`IgnoreLeapDays`]: LeapYearPolicy::IgnoreLeapDays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeapYearPolicy {
    /// Proleptic Gregorian rules; leap years have 366 days.
    #[default]
    Gregorian,
    /// February 29 is folded onto February 28 for day-of-year purposes.
    IgnoreLeapDays,
}

/// A month/day pair with a year offset relative to the cycle it belongs to.
///
/// Ordering is by `(year_offset, month, day)`, which is the order in which
/// the dates occur within one production process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativeDate {
    year_offset: u32,
    month: u32,
    day: u32,
}

/// Length of each month in a non-leap year.
const MONTH_LENGTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

impl RelativeDate {
    /// Build a relative date, rejecting impossible month/day pairs.
    ///
    /// February 29 is rejected because it cannot be resolved in most years.
    pub fn new(month: u32, day: u32, year_offset: u32) -> Result<Self, DateParseError> {
        let month_len = month
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| MONTH_LENGTHS.get(i).copied());
        match month_len {
            Some(len) if day >= 1 && day <= len => Ok(Self {
                year_offset,
                month,
                day,
            }),
            _ => Err(DateParseError::InvalidMonthDay { month, day }),
        }
    }

    /// Month, 1 to 12.
    pub const fn month(self) -> u32 {
        self.month
    }

    /// Day of month.
    pub const fn day(self) -> u32 {
        self.day
    }

    /// Number of years after the cycle's first year.
    pub const fn year_offset(self) -> u32 {
        self.year_offset
    }

    /// Same month and day with a different year offset.
    #[must_use]
    pub const fn with_year_offset(self, year_offset: u32) -> Self {
        Self {
            year_offset,
            month: self.month,
            day: self.day,
        }
    }

    /// Resolve to a calendar date, `base_year + year_offset`.
    pub fn resolve(self, base_year: i32) -> Option<NaiveDate> {
        let offset = i32::try_from(self.year_offset).ok()?;
        let year = base_year.checked_add(offset)?;
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }

    /// Resolve in exactly `year`, ignoring the year offset.
    pub fn in_year(self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

impl fmt::Display for RelativeDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.year_offset == 0 {
            write!(f, "{:02}-{:02}", self.month, self.day)
        } else {
            write!(f, "+{}:{:02}-{:02}", self.year_offset, self.month, self.day)
        }
    }
}

/// A date key in an operation schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SimDate {
    /// A fixed calendar date.
    Absolute(NaiveDate),
    /// A month/day repeated every cycle.
    Relative(RelativeDate),
}

impl SimDate {
    /// Whether this is a relative date.
    pub const fn is_relative(&self) -> bool {
        matches!(self, Self::Relative(_))
    }

    /// Month of the date, 1 to 12.
    pub fn month(&self) -> u32 {
        match self {
            Self::Absolute(d) => d.month(),
            Self::Relative(r) => r.month(),
        }
    }

    /// Day of month.
    pub fn day(&self) -> u32 {
        match self {
            Self::Absolute(d) => d.day(),
            Self::Relative(r) => r.day(),
        }
    }
}

impl From<NaiveDate> for SimDate {
    fn from(date: NaiveDate) -> Self {
        Self::Absolute(date)
    }
}

impl From<RelativeDate> for SimDate {
    fn from(date: RelativeDate) -> Self {
        Self::Relative(date)
    }
}

impl fmt::Display for SimDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Relative(r) => write!(f, "{r}"),
        }
    }
}

impl FromStr for SimDate {
    type Err = DateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let malformed = || DateParseError::Malformed {
            input: input.to_owned(),
        };

        if let Some(rest) = input.strip_prefix('+') {
            let (offset, month_day) = rest.split_once(':').ok_or_else(malformed)?;
            let offset: u32 = offset.parse().map_err(|_e| malformed())?;
            let (month, day) = parse_month_day(month_day).ok_or_else(malformed)?;
            return RelativeDate::new(month, day, offset).map(Self::Relative);
        }

        match input.matches('-').count() {
            1 => {
                let (month, day) = parse_month_day(input).ok_or_else(malformed)?;
                RelativeDate::new(month, day, 0).map(Self::Relative)
            }
            2 => NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .map(Self::Absolute)
                .map_err(|_e| malformed()),
            _ => Err(malformed()),
        }
    }
}

impl TryFrom<String> for SimDate {
    type Error = DateParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SimDate> for String {
    fn from(date: SimDate) -> Self {
        date.to_string()
    }
}

fn parse_month_day(s: &str) -> Option<(u32, u32)> {
    let (month, day) = s.split_once('-')?;
    Some((month.parse().ok()?, day.parse().ok()?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_three_forms() {
        assert_eq!(
            "2021-04-15".parse::<SimDate>().unwrap(),
            SimDate::Absolute(NaiveDate::from_ymd_opt(2021, 4, 15).unwrap())
        );
        assert_eq!(
            "04-15".parse::<SimDate>().unwrap(),
            SimDate::Relative(RelativeDate::new(4, 15, 0).unwrap())
        );
        assert_eq!(
            "+1:07-31".parse::<SimDate>().unwrap(),
            SimDate::Relative(RelativeDate::new(7, 31, 1).unwrap())
        );
    }

    #[test]
    fn rejects_feb_29_and_garbage() {
        assert!(matches!(
            "02-29".parse::<SimDate>(),
            Err(DateParseError::InvalidMonthDay { month: 2, day: 29 })
        ));
        assert!("13-01".parse::<SimDate>().is_err());
        assert!("tomorrow".parse::<SimDate>().is_err());
        assert!("+x:01-01".parse::<SimDate>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for s in ["2020-02-29", "09-20", "+2:03-01"] {
            let parsed: SimDate = s.parse().unwrap();
            assert_eq!(parsed.to_string(), s);
        }
    }

    #[test]
    fn relative_dates_order_by_offset_then_month_day() {
        let autumn = RelativeDate::new(9, 20, 0).unwrap();
        let spring = RelativeDate::new(4, 1, 1).unwrap();
        let summer = RelativeDate::new(7, 31, 1).unwrap();
        assert!(autumn < spring);
        assert!(spring < summer);
    }

    #[test]
    fn resolve_adds_offset() {
        let harvest = RelativeDate::new(7, 31, 1).unwrap();
        assert_eq!(
            harvest.resolve(2020),
            NaiveDate::from_ymd_opt(2021, 7, 31)
        );
        assert_eq!(harvest.in_year(2020), NaiveDate::from_ymd_opt(2020, 7, 31));
    }

    #[test]
    fn deserializes_from_yaml_string() {
        let dates: Vec<SimDate> = serde_yml::from_str("- \"2020-01-01\"\n- \"+1:03-15\"\n").unwrap();
        assert_eq!(dates.len(), 2);
        assert!(!dates[0].is_relative());
        assert!(dates[1].is_relative());
    }
}
