//! Daily contact-care recommendation.
//!
//! Contacts are scored on importance, time since the last ping, and how soon
//! their birthday or anniversary comes up. The best-scoring slice forms a
//! candidate pool that is reordered with a per-day hash, then up to three
//! contacts are chosen, preferring ones that widen the set of tags covered.
//!
//! # Shuffle seed contract
//!
//! The pool order for a day is the ascending order of
//! `djb2(format!("{YYYY-MM-DD}{contact_id}"))`, ties broken by id. Given the
//! same contacts and date the selection is always identical.

use std::collections::HashSet;

use chrono::{FixedOffset, NaiveDate};

use crate::clock;
use crate::date::format_date;
use crate::model::{CalendarType, Contact, ContactId};
use crate::recurrence;

pub const DAILY_PICK_COUNT: usize = 3;
const DIVERSITY_PICKS: usize = 2;

const RECENCY_CAP_DAYS: i64 = 60;
const NO_HISTORY_SCORE: i64 = 30;
const EVENT_WINDOW_DAYS: i64 = 30;
const EVENT_BONUS: i64 = 20;

/// djb2 over the UTF-8 bytes of `input`: `h = h * 33 + b`, seeded with 5381,
/// wrapping at `u32`.
pub fn djb2(input: &str) -> u32 {
    input
        .bytes()
        .fold(5381u32, |h, b| h.wrapping_mul(33).wrapping_add(u32::from(b)))
}

/// Per-day ordering key for a contact.
pub fn shuffle_key(today: NaiveDate, contact_id: &str) -> u32 {
    djb2(&format!("{}{}", format_date(today), contact_id))
}

/// Days until the next yearly occurrence of a solar month/day, or `None` when
/// the stored value does not parse.
pub fn days_until_event(stored: &str, today: NaiveDate) -> Option<i64> {
    recurrence::next_occurrence(stored, CalendarType::Solar, true, today)
        .ok()
        .map(|next| (next - today).num_days())
}

/// Days until the nearer of the contact's birthday and anniversary.
pub fn nearest_event_days(contact: &Contact, today: NaiveDate) -> Option<i64> {
    [contact.birthday.as_deref(), contact.anniversary.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(|stored| days_until_event(stored, today))
        .min()
}

pub fn score_contact(contact: &Contact, today: NaiveDate, tz: &FixedOffset) -> i64 {
    let importance = i64::from(contact.importance()) * 10;

    let recency = match contact.last_contacted_at {
        Some(at) => clock::days_since(at, today, tz).clamp(0, RECENCY_CAP_DAYS),
        None => NO_HISTORY_SCORE,
    };

    let event = match nearest_event_days(contact, today) {
        Some(days) if days <= EVENT_WINDOW_DAYS => (EVENT_WINDOW_DAYS - days) + EVENT_BONUS,
        _ => 0,
    };

    importance + recency + event
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredContact<'a> {
    pub contact: &'a Contact,
    pub score: i64,
}

/// Contacts ordered by descending score, ties broken by id.
pub fn rank_contacts<'a>(
    contacts: &'a [Contact],
    today: NaiveDate,
    tz: &FixedOffset,
) -> Vec<ScoredContact<'a>> {
    let mut ranked: Vec<ScoredContact<'a>> = contacts
        .iter()
        .map(|contact| ScoredContact {
            contact,
            score: score_contact(contact, today, tz),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.contact.id.cmp(&b.contact.id))
    });
    ranked
}

/// Top 30% of `total`, rounded up, but never fewer than three.
pub fn candidate_pool_size(total: usize) -> usize {
    (total * 3).div_ceil(10).max(DAILY_PICK_COUNT).min(total)
}

/// Choose today's contacts.
///
/// With three or fewer contacts every contact is returned unscored.
pub fn select_daily(contacts: &[Contact], today: NaiveDate, tz: &FixedOffset) -> Vec<ContactId> {
    if contacts.len() <= DAILY_PICK_COUNT {
        return contacts.iter().map(|c| c.id.clone()).collect();
    }

    let ranked = rank_contacts(contacts, today, tz);
    let mut pool: Vec<&Contact> = ranked
        .iter()
        .take(candidate_pool_size(contacts.len()))
        .map(|s| s.contact)
        .collect();
    pool.sort_by(|a, b| {
        shuffle_key(today, &a.id)
            .cmp(&shuffle_key(today, &b.id))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut seen_tags: HashSet<&str> = HashSet::new();
    let mut chosen: Vec<&Contact> = Vec::with_capacity(DAILY_PICK_COUNT);

    for &contact in &pool {
        if chosen.len() >= DIVERSITY_PICKS {
            break;
        }
        let tags = contact
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty());
        if tags.clone().any(|t| !seen_tags.contains(t)) {
            seen_tags.extend(tags);
            chosen.push(contact);
        }
    }

    for &contact in &pool {
        if chosen.len() >= DAILY_PICK_COUNT {
            break;
        }
        if !chosen.iter().any(|c| c.id == contact.id) {
            chosen.push(contact);
        }
    }

    tracing::debug!(
        total = contacts.len(),
        pool = pool.len(),
        picked = chosen.len(),
        "selected daily contacts"
    );

    chosen.into_iter().map(|c| c.id.clone()).collect()
}
