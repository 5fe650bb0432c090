//! Merged timeline of anniversaries and contact dates.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::dday::{DDay, dday_label};
use crate::model::{Anniversary, CalendarType, Contact};
use crate::recurrence;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventSource {
    Anniversary { id: String },
    Birthday { contact_id: String },
    ContactAnniversary { contact_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingEvent {
    pub title: String,
    pub date: NaiveDate,
    pub calendar: CalendarType,
    pub dday: DDay,
    /// Ordinal of this occurrence when the stored date carries a year.
    pub occurrence: Option<i32>,
    pub source: EventSource,
}

fn resolve_event(
    title: String,
    stored: &str,
    calendar: CalendarType,
    is_recurring: bool,
    source: EventSource,
    today: NaiveDate,
) -> Option<UpcomingEvent> {
    let resolved = recurrence::resolve(stored, calendar, is_recurring, today).and_then(|o| {
        let occurrence = recurrence::occurrence_number(stored, calendar, is_recurring, today)?;
        Ok((o.date, occurrence))
    });
    match resolved {
        Ok((date, occurrence)) => Some(UpcomingEvent {
            title,
            date,
            calendar,
            dday: dday_label(date, today),
            occurrence,
            source,
        }),
        Err(err) => {
            warn!(title = %title, stored, error = %err, "skipping unresolvable event");
            None
        }
    }
}

/// Resolve every anniversary and contact birthday/anniversary against
/// `today`.
///
/// Upcoming events (today included) come first, nearest first; past one-off
/// events follow, most recent first.
pub fn upcoming_events(
    anniversaries: &[Anniversary],
    contacts: &[Contact],
    today: NaiveDate,
) -> Vec<UpcomingEvent> {
    let mut events = Vec::new();

    for ann in anniversaries {
        events.extend(resolve_event(
            ann.title.clone(),
            &ann.date,
            ann.calendar,
            ann.is_recurring,
            EventSource::Anniversary { id: ann.id.clone() },
            today,
        ));
    }

    for contact in contacts {
        if let Some(birthday) = &contact.birthday {
            events.extend(resolve_event(
                format!("{} birthday", contact.name),
                birthday,
                CalendarType::Solar,
                true,
                EventSource::Birthday {
                    contact_id: contact.id.clone(),
                },
                today,
            ));
        }
        if let Some(anniversary) = &contact.anniversary {
            events.extend(resolve_event(
                format!("{} anniversary", contact.name),
                anniversary,
                CalendarType::Solar,
                true,
                EventSource::ContactAnniversary {
                    contact_id: contact.id.clone(),
                },
                today,
            ));
        }
    }

    events.sort_by_key(|e| {
        let diff = e.dday.diff_days;
        if diff >= 0 { (0, diff) } else { (1, -diff) }
    });
    events
}
