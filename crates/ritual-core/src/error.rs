use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("unparseable date: {0:?}")]
    Unparseable(String),

    #[error("no such calendar date: {year:04}-{month:02}-{day:02}")]
    InvalidSolarDate { year: i32, month: u32, day: u32 },

    #[error("invalid lunar month/day: {month}/{day}")]
    InvalidLunarDate { month: u32, day: u32 },

    #[error("lunar year {0} outside supported range 1900..=2100")]
    LunarOutOfRange(i32),

    #[error("solar date {0} outside supported lunar table range")]
    SolarOutOfRange(chrono::NaiveDate),
}
