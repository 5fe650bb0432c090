//! Row types shared by the storage backends.
//!
//! Field names match the backend's column names so rows serialise directly
//! into table payloads.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::DateError;
use crate::recurrence;

pub type ContactId = String;

/// Which calendar an anniversary's month/day is read against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarType {
    #[default]
    Solar,
    Lunar,
}

impl CalendarType {
    pub fn as_str(self) -> &'static str {
        match self {
            CalendarType::Solar => "solar",
            CalendarType::Lunar => "lunar",
        }
    }
}

impl fmt::Display for CalendarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalendarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solar" => Ok(CalendarType::Solar),
            "lunar" => Ok(CalendarType::Lunar),
            other => Err(format!("unknown calendar type: {other}")),
        }
    }
}

/// A dated event owned by the user.
///
/// `date` is stored as "MM-DD plus optional year" (`YYYY-MM-DD`, `MM-DD` or
/// `MM/DD`); whether that month/day is solar or lunar depends only on
/// `calendar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anniversary {
    pub id: String,
    pub title: String,
    pub date: String,
    #[serde(rename = "type", default)]
    pub calendar: CalendarType,
    #[serde(default)]
    pub is_recurring: bool,
}

impl Anniversary {
    /// Next real-world occurrence on or after `today` (or the fixed date for
    /// one-off events).
    pub fn next_occurrence(&self, today: NaiveDate) -> Result<NaiveDate, DateError> {
        recurrence::next_occurrence(&self.date, self.calendar, self.is_recurring, today)
    }
}

/// A person the user wants to keep in touch with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub importance: Option<u8>,
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub anniversary: Option<String>,
    #[serde(default)]
    pub last_contacted_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn new(id: impl Into<ContactId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: None,
            tags: Vec::new(),
            importance: None,
            birthday: None,
            anniversary: None,
            last_contacted_at: None,
        }
    }

    /// Importance in 1..=3; missing values count as 1.
    pub fn importance(&self) -> u8 {
        self.importance.unwrap_or(1).clamp(1, 3)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// How the user reached out to a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PingKind {
    Call,
    Sms,
    Share,
}

impl PingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PingKind::Call => "call",
            PingKind::Sms => "sms",
            PingKind::Share => "share",
        }
    }
}

impl FromStr for PingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(PingKind::Call),
            "sms" => Ok(PingKind::Sms),
            "share" => Ok(PingKind::Share),
            other => Err(format!("unknown ping kind: {other}")),
        }
    }
}

/// A logged care action. Recording one moves the contact's
/// `last_contacted_at` forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub contact_id: ContactId,
    pub kind: PingKind,
    pub at: DateTime<Utc>,
}

/// The day's memoised contact recommendation.
///
/// At most one row exists per `(user_id, pick_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPick {
    pub user_id: String,
    pub pick_date: NaiveDate,
    pub picks: Vec<ContactId>,
}
