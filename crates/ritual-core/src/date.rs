//! Date normalisation for user-entered and stored dates.
//!
//! Stored dates are calendar-agnostic: a month/day with an optional year.
//! Accepted shapes:
//!
//! - `YYYY-MM-DD` (also `YYYY/MM/DD`, and ISO timestamps whose date part has
//!   that shape)
//! - `MM-DD` / `MM/DD`, meaning "this year"

use chrono::{Datelike, NaiveDate};
use tracing::warn;

use crate::error::DateError;

/// A month/day with an optional year, as stored on anniversaries and contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    pub year: Option<i32>,
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn parse(input: &str) -> Result<Self, DateError> {
        let unparseable = || DateError::Unparseable(input.to_string());

        let s = input.trim();
        // Drop any time component from timestamp-shaped input.
        let s = s.split(['T', ' ']).next().unwrap_or(s);
        if s.is_empty() {
            return Err(unparseable());
        }

        let parts: Vec<&str> = s.split(['-', '/']).collect();
        let numbers = parts
            .iter()
            .map(|p| {
                if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                    None
                } else {
                    p.parse::<u32>().ok()
                }
            })
            .collect::<Option<Vec<u32>>>()
            .ok_or_else(unparseable)?;

        let (year, month, day) = match (parts.as_slice(), numbers.as_slice()) {
            ([y, _, _], [year, month, day]) if y.len() == 4 => {
                (Some(*year as i32), *month, *day)
            }
            ([_, _], [month, day]) => (None, *month, *day),
            _ => return Err(unparseable()),
        };

        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(unparseable());
        }

        Ok(Self { year, month, day })
    }

    /// The solar date with this month/day in `year`.
    ///
    /// Feb 29 falls back to Feb 28 in non-leap years; any other impossible
    /// day (e.g. 04-31) is an error.
    pub fn in_year(&self, year: i32) -> Result<NaiveDate, DateError> {
        if let Some(date) = NaiveDate::from_ymd_opt(year, self.month, self.day) {
            return Ok(date);
        }
        if self.month == 2
            && self.day == 29
            && let Some(date) = NaiveDate::from_ymd_opt(year, 2, 28)
        {
            return Ok(date);
        }
        Err(DateError::InvalidSolarDate {
            year,
            month: self.month,
            day: self.day,
        })
    }

    /// The stored year, or `fallback_year` when the date is month/day only.
    pub fn year_or(&self, fallback_year: i32) -> i32 {
        self.year.unwrap_or(fallback_year)
    }
}

/// Strictly parse a stored or user-entered date into a solar date.
///
/// Month/day-only input resolves against `today`'s year.
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate, DateError> {
    let md = MonthDay::parse(input)?;
    md.in_year(md.year_or(today.year()))
}

/// Normalise a date string into canonical `YYYY-MM-DD`.
///
/// Input that cannot be parsed resolves to `today`. The substitution is
/// logged at warn level; callers that need to reject bad input should use
/// [`parse_date`].
pub fn normalize_date(input: &str, today: NaiveDate) -> String {
    let date = match parse_date(input, today) {
        Ok(date) => date,
        Err(err) => {
            warn!(input, error = %err, "unparseable date, substituting today");
            today
        }
    };
    format_date(date)
}

/// Canonical `YYYY-MM-DD` rendering.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn full_date_passes_through() {
        let today = ymd(2025, 6, 15);
        assert_eq!(normalize_date("1990-12-25", today), "1990-12-25");
        assert_eq!(normalize_date("1990/12/25", today), "1990-12-25");
    }

    #[test]
    fn month_day_means_this_year() {
        let today = ymd(2025, 6, 15);
        assert_eq!(normalize_date("12/25", today), "2025-12-25");
        assert_eq!(normalize_date("3-1", today), "2025-03-01");
    }

    #[test]
    fn unparseable_falls_back_to_today() {
        let today = ymd(2025, 6, 15);
        assert_eq!(normalize_date("someday", today), "2025-06-15");
        assert_eq!(normalize_date("", today), "2025-06-15");
        assert_eq!(normalize_date("13/40", today), "2025-06-15");
    }

    #[test]
    fn strict_parse_reports_errors() {
        let today = ymd(2025, 6, 15);
        assert!(matches!(
            parse_date("someday", today),
            Err(DateError::Unparseable(_))
        ));
        assert!(matches!(
            parse_date("2025-04-31", today),
            Err(DateError::InvalidSolarDate { .. })
        ));
    }

    #[test]
    fn timestamp_date_part_is_used() {
        let today = ymd(2025, 6, 15);
        assert_eq!(
            parse_date("2024-02-10T09:30:00+09:00", today).unwrap(),
            ymd(2024, 2, 10)
        );
    }

    #[test]
    fn month_day_decomposition() {
        assert_eq!(
            MonthDay::parse("1990-12-25").unwrap(),
            MonthDay {
                year: Some(1990),
                month: 12,
                day: 25
            }
        );
        assert_eq!(
            MonthDay::parse(" 07/04 ").unwrap(),
            MonthDay {
                year: None,
                month: 7,
                day: 4
            }
        );
        assert!(MonthDay::parse("90-12-25").is_err());
        assert!(MonthDay::parse("12-25-1990").is_err());
        assert!(MonthDay::parse("12-x").is_err());
    }

    #[test]
    fn leap_day_falls_back_in_common_years() {
        let md = MonthDay::parse("2000-02-29").unwrap();
        assert_eq!(md.in_year(2024).unwrap(), ymd(2024, 2, 29));
        assert_eq!(md.in_year(2025).unwrap(), ymd(2025, 2, 28));
    }
}
