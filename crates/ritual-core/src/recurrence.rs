//! Next-occurrence resolution for stored anniversaries.

use chrono::{Datelike, NaiveDate};

use crate::date::MonthDay;
use crate::error::DateError;
use crate::lunar;
use crate::model::CalendarType;

/// A resolved occurrence: the solar date plus the calendar year it was
/// computed for (the lunar year for lunar anniversaries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub year: i32,
}

fn on_year(md: &MonthDay, calendar: CalendarType, year: i32) -> Result<Occurrence, DateError> {
    let date = match calendar {
        CalendarType::Solar => md.in_year(year)?,
        CalendarType::Lunar => lunar::lunar_to_solar(md.month, md.day, year)?,
    };
    Ok(Occurrence { date, year })
}

/// Resolve a stored date into its next real-world occurrence.
///
/// One-off events resolve to their fixed date (lunar ones converted using
/// the stored year). Recurring events resolve to this year's occurrence if
/// it is on or after `today`, otherwise next year's.
pub fn resolve(
    stored_date: &str,
    calendar: CalendarType,
    is_recurring: bool,
    today: NaiveDate,
) -> Result<Occurrence, DateError> {
    let md = MonthDay::parse(stored_date)?;

    if !is_recurring {
        return on_year(&md, calendar, md.year_or(today.year()));
    }

    let this_year = on_year(&md, calendar, today.year())?;
    if this_year.date >= today {
        return Ok(this_year);
    }
    on_year(&md, calendar, today.year() + 1)
}

/// Solar date of the next occurrence; see [`resolve`].
pub fn next_occurrence(
    stored_date: &str,
    calendar: CalendarType,
    is_recurring: bool,
    today: NaiveDate,
) -> Result<NaiveDate, DateError> {
    resolve(stored_date, calendar, is_recurring, today).map(|o| o.date)
}

/// Ordinal of the upcoming occurrence of a recurring event whose stored date
/// carries a year (e.g. 35 for the 35th birthday). `None` for one-off events,
/// month/day-only dates, and the founding occurrence itself.
pub fn occurrence_number(
    stored_date: &str,
    calendar: CalendarType,
    is_recurring: bool,
    today: NaiveDate,
) -> Result<Option<i32>, DateError> {
    if !is_recurring {
        return Ok(None);
    }
    let Some(origin) = MonthDay::parse(stored_date)?.year else {
        return Ok(None);
    };
    let occurrence = resolve(stored_date, calendar, is_recurring, today)?;
    let n = occurrence.year - origin;
    Ok((n > 0).then_some(n))
}
