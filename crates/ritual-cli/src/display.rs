//! Plain-text rendering for the `ritual` subcommands.
//!
//! Listings are grouped under a section header with aligned
//! `label  value` rows; JSON output bypasses this module entirely.

use chrono::{Duration, FixedOffset, NaiveDate};
use ritual_core::care::{nearest_event_days, score_contact};
use ritual_core::clock::days_since;
use ritual_core::date::format_date;
use ritual_core::lunar::LunarDate;
use ritual_core::upcoming::EventSource;
use ritual_core::{Anniversary, CalendarType, Contact, DDay, UpcomingEvent, dday_label};

const MAX_TAGS: usize = 5;

// ── Public API ──

pub fn print_dday(target: NaiveDate, dday: &DDay) {
    println!("  {:<26} {}", format_date(target), dday.label);
}

pub fn print_lunar_date(solar: NaiveDate, lunar: &LunarDate) {
    println!("  {:<26} {}", "solar", format_date(solar));
    println!("  {:<26} {}", "lunar", lunar_label(lunar));
}

pub fn print_anniversaries(rows: &[Anniversary], today: NaiveDate) {
    if rows.is_empty() {
        println!("No anniversaries.");
        return;
    }
    println!("=== Anniversaries ({}) ===", rows.len());
    for ann in rows {
        println!("{}  [{}]", ann.title, ann.id);
        println!("  {:<26} {}", "stored", stored_label(&ann.date, ann.calendar));
        println!(
            "  {:<26} {}",
            "repeats",
            if ann.is_recurring { "yearly" } else { "once" }
        );
        match ann.next_occurrence(today) {
            Ok(next) => println!(
                "  {:<26} {} ({})",
                "next",
                format_date(next),
                dday_label(next, today).label
            ),
            Err(err) => println!("  {:<26} (unresolvable: {err})", "next"),
        }
    }
}

pub fn print_contacts(rows: &[Contact], today: NaiveDate, tz: &FixedOffset) {
    if rows.is_empty() {
        println!("No contacts.");
        return;
    }
    println!("=== Contacts ({}) ===", rows.len());
    for contact in rows {
        print_contact(contact, today, tz);
        println!("  {:<26} {}", "score", score_contact(contact, today, tz));
    }
}

pub fn print_picks(picked: &[&Contact], today: NaiveDate, tz: &FixedOffset) {
    println!("=== Today's picks ({}) ===", format_date(today));
    if picked.is_empty() {
        println!("  Nobody to reach out to yet. Add contacts first.");
        return;
    }
    for contact in picked {
        print_contact(contact, today, tz);
        if let Some(days) = nearest_event_days(contact, today) {
            println!("  {:<26} {}", "next event", countdown_label(days, today));
        }
    }
}

pub fn print_upcoming(events: &[UpcomingEvent]) {
    if events.is_empty() {
        println!("Nothing coming up.");
        return;
    }
    println!("=== Upcoming ===");
    for event in events {
        let ordinal = event
            .occurrence
            .map(|n| format!(" #{n}"))
            .unwrap_or_default();
        println!(
            "  {:<8} {}  {}{} ({})",
            event.dday.label,
            format_date(event.date),
            event.title,
            ordinal,
            source_label(&event.source)
        );
    }
}

// ── Row formatting ──

fn print_contact(contact: &Contact, today: NaiveDate, tz: &FixedOffset) {
    println!("{}  [{}]", contact.name, contact.id);
    if let Some(phone) = &contact.phone {
        println!("  {:<26} {}", "phone", phone);
    }
    if !contact.tags.is_empty() {
        println!("  {:<26} {}", "tags", tags_label(&contact.tags));
    }
    println!("  {:<26} {}", "importance", contact.importance());
    if let Some(birthday) = &contact.birthday {
        println!("  {:<26} {}", "birthday", birthday);
    }
    if let Some(anniversary) = &contact.anniversary {
        println!("  {:<26} {}", "anniversary", anniversary);
    }
    let last = match contact.last_contacted_at {
        Some(at) => last_contacted_label(days_since(at, today, tz)),
        None => "never".to_string(),
    };
    println!("  {:<26} {}", "last contacted", last);
}

fn stored_label(stored: &str, calendar: CalendarType) -> String {
    match calendar {
        CalendarType::Solar => stored.to_string(),
        CalendarType::Lunar => format!("{stored} (lunar)"),
    }
}

fn lunar_label(lunar: &LunarDate) -> String {
    let leap = if lunar.is_leap_month { " (leap)" } else { "" };
    format!(
        "{:04}-{:02}-{:02}{leap}",
        lunar.year, lunar.month, lunar.day
    )
}

fn tags_label(tags: &[String]) -> String {
    let shown: Vec<&str> = tags.iter().take(MAX_TAGS).map(String::as_str).collect();
    if tags.len() > MAX_TAGS {
        format!("{} (+{} more)", shown.join(", "), tags.len() - MAX_TAGS)
    } else {
        shown.join(", ")
    }
}

fn last_contacted_label(days: i64) -> String {
    match days {
        d if d <= 0 => "today".to_string(),
        1 => "yesterday".to_string(),
        d => format!("{d} days ago"),
    }
}

/// D-Day label for an event `days` ahead of `today`.
fn countdown_label(days: i64, today: NaiveDate) -> String {
    let target = today + Duration::days(days);
    dday_label(target, today).label
}

fn source_label(source: &EventSource) -> &'static str {
    match source {
        EventSource::Anniversary { .. } => "anniversary",
        EventSource::Birthday { .. } => "birthday",
        EventSource::ContactAnniversary { .. } => "contact anniversary",
    }
}
