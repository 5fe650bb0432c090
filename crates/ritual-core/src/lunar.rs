//! Lunisolar (Korean/Chinese) calendar conversion.
//!
//! Backed by a per-year table covering lunar years 1900..=2100. Each entry
//! packs one lunar year:
//!
//! - bits 0-3: leap (intercalary) month number, 0 if none
//! - bits 4-15: month lengths, bit 15 = month 1 ... bit 4 = month 12
//!   (set = 30 days, clear = 29 days)
//! - bit 16: leap month length (set = 30 days)
//!
//! Lunar 1900-01-01 falls on solar 1900-01-31.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::error::DateError;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

#[rustfmt::skip]
const LUNAR_INFO: [u32; 201] = [
    0x04bd8, 0x04ae0, 0x0a570, 0x054d5, 0x0d260, 0x0d950, 0x16554, 0x056a0, 0x09ad0, 0x055d2, // 1900
    0x04ae0, 0x0a5b6, 0x0a4d0, 0x0d250, 0x1d255, 0x0b540, 0x0d6a0, 0x0ada2, 0x095b0, 0x14977, // 1910
    0x04970, 0x0a4b0, 0x0b4b5, 0x06a50, 0x06d40, 0x1ab54, 0x02b60, 0x09570, 0x052f2, 0x04970, // 1920
    0x06566, 0x0d4a0, 0x0ea50, 0x16a95, 0x05ad0, 0x02b60, 0x186e3, 0x092e0, 0x1c8d7, 0x0c950, // 1930
    0x0d4a0, 0x1d8a6, 0x0b550, 0x056a0, 0x1a5b4, 0x025d0, 0x092d0, 0x0d2b2, 0x0a950, 0x0b557, // 1940
    0x06ca0, 0x0b550, 0x15355, 0x04da0, 0x0a5b0, 0x14573, 0x052b0, 0x0a9a8, 0x0e950, 0x06aa0, // 1950
    0x0aea6, 0x0ab50, 0x04b60, 0x0aae4, 0x0a570, 0x05260, 0x0f263, 0x0d950, 0x05b57, 0x056a0, // 1960
    0x096d0, 0x04dd5, 0x04ad0, 0x0a4d0, 0x0d4d4, 0x0d250, 0x0d558, 0x0b540, 0x0b6a0, 0x195a6, // 1970
    0x095b0, 0x049b0, 0x0a974, 0x0a4b0, 0x0b27a, 0x06a50, 0x06d40, 0x0af46, 0x0ab60, 0x09570, // 1980
    0x04af5, 0x04970, 0x064b0, 0x074a3, 0x0ea50, 0x06b58, 0x05ac0, 0x0ab60, 0x096d5, 0x092e0, // 1990
    0x0c960, 0x0d954, 0x0d4a0, 0x0da50, 0x07552, 0x056a0, 0x0abb7, 0x025d0, 0x092d0, 0x0cab5, // 2000
    0x0a950, 0x0b4a0, 0x0baa4, 0x0ad50, 0x055d9, 0x04ba0, 0x0a5b0, 0x15176, 0x052b0, 0x0a930, // 2010
    0x07954, 0x06aa0, 0x0ad50, 0x05b52, 0x04b60, 0x0a6e6, 0x0a4e0, 0x0d260, 0x0ea65, 0x0d530, // 2020
    0x05aa0, 0x076a3, 0x096d0, 0x04afb, 0x04ad0, 0x0a4d0, 0x1d0b6, 0x0d250, 0x0d520, 0x0dd45, // 2030
    0x0b5a0, 0x056d0, 0x055b2, 0x049b0, 0x0a577, 0x0a4b0, 0x0aa50, 0x1b255, 0x06d20, 0x0ada0, // 2040
    0x14b63, 0x09370, 0x049f8, 0x04970, 0x064b0, 0x168a6, 0x0ea50, 0x06b20, 0x1a6c4, 0x0aae0, // 2050
    0x092e0, 0x0d2e3, 0x0c960, 0x0d557, 0x0d4a0, 0x0da50, 0x05d55, 0x056a0, 0x0a6d0, 0x055d4, // 2060
    0x052d0, 0x0a9b8, 0x0a950, 0x0b4a0, 0x0b6a6, 0x0ad50, 0x055a0, 0x0aba4, 0x0a5b0, 0x052b0, // 2070
    0x0b273, 0x06930, 0x07337, 0x06aa0, 0x0ad50, 0x14b55, 0x04b60, 0x0a570, 0x054e4, 0x0d160, // 2080
    0x0e968, 0x0d520, 0x0daa0, 0x16aa6, 0x056d0, 0x04ae0, 0x0a9d4, 0x0a2d0, 0x0d150, 0x0f252, // 2090
    0x0d520,                                                                                   // 2100
];

/// A date on the lunisolar calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LunarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub is_leap_month: bool,
}

fn info(year: i32) -> Result<u32, DateError> {
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(DateError::LunarOutOfRange(year));
    }
    Ok(LUNAR_INFO[(year - MIN_YEAR) as usize])
}

fn epoch() -> Result<NaiveDate, DateError> {
    NaiveDate::from_ymd_opt(1900, 1, 31).ok_or(DateError::LunarOutOfRange(MIN_YEAR))
}

/// Intercalary month of `year` (1..=12), or 0 when the year has none.
pub fn leap_month(year: i32) -> Result<u32, DateError> {
    Ok(info(year)? & 0xf)
}

/// Length of the intercalary month of `year`, 0 when there is none.
pub fn leap_month_days(year: i32) -> Result<u32, DateError> {
    let info = info(year)?;
    if info & 0xf == 0 {
        Ok(0)
    } else if info & 0x10000 != 0 {
        Ok(30)
    } else {
        Ok(29)
    }
}

/// Length of ordinary (non-leap) month `month` of `year`.
pub fn lunar_month_days(year: i32, month: u32) -> Result<u32, DateError> {
    if !(1..=12).contains(&month) {
        return Err(DateError::InvalidLunarDate { month, day: 0 });
    }
    let info = info(year)?;
    Ok(if info & (0x10000 >> month) != 0 { 30 } else { 29 })
}

/// Total days in lunar year `year`, leap month included.
pub fn lunar_year_days(year: i32) -> Result<u32, DateError> {
    let mut total = leap_month_days(year)?;
    for month in 1..=12 {
        total += lunar_month_days(year, month)?;
    }
    Ok(total)
}

/// Solar date of the (non-leap) lunar `month`/`day` in lunar year `lunar_year`.
///
/// Day 30 in a 29-day month resolves to day 29.
pub fn lunar_to_solar(month: u32, day: u32, lunar_year: i32) -> Result<NaiveDate, DateError> {
    if !(1..=12).contains(&month) || !(1..=30).contains(&day) {
        return Err(DateError::InvalidLunarDate { month, day });
    }
    info(lunar_year)?;

    let mut offset: u64 = 0;
    for year in MIN_YEAR..lunar_year {
        offset += u64::from(lunar_year_days(year)?);
    }

    let leap = leap_month(lunar_year)?;
    for m in 1..month {
        offset += u64::from(lunar_month_days(lunar_year, m)?);
        if m == leap {
            offset += u64::from(leap_month_days(lunar_year)?);
        }
    }

    let day = day.min(lunar_month_days(lunar_year, month)?);
    offset += u64::from(day - 1);

    epoch()?
        .checked_add_days(Days::new(offset))
        .ok_or(DateError::LunarOutOfRange(lunar_year))
}

/// Lunar date falling on solar `date`.
pub fn solar_to_lunar(date: NaiveDate) -> Result<LunarDate, DateError> {
    let days = (date - epoch()?).num_days();
    if days < 0 {
        return Err(DateError::SolarOutOfRange(date));
    }
    let mut offset = days as u64;

    let mut year = MIN_YEAR;
    loop {
        if year > MAX_YEAR {
            return Err(DateError::SolarOutOfRange(date));
        }
        let len = u64::from(lunar_year_days(year)?);
        if offset < len {
            break;
        }
        offset -= len;
        year += 1;
    }

    let leap = leap_month(year)?;
    for month in 1..=12 {
        let len = u64::from(lunar_month_days(year, month)?);
        if offset < len {
            return Ok(LunarDate {
                year,
                month,
                day: offset as u32 + 1,
                is_leap_month: false,
            });
        }
        offset -= len;

        if month == leap {
            let len = u64::from(leap_month_days(year)?);
            if offset < len {
                return Ok(LunarDate {
                    year,
                    month,
                    day: offset as u32 + 1,
                    is_leap_month: true,
                });
            }
            offset -= len;
        }
    }

    // The year-length walk above guarantees the offset lands inside a month.
    Err(DateError::SolarOutOfRange(date))
}
