//! In-process storage, used by `ritual --ephemeral` and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use ritual_core::{Anniversary, Contact, DailyPick, Ping};
use tokio::sync::RwLock;

use crate::{Storage, StoreError};

#[derive(Default)]
struct UserData {
    anniversaries: Vec<Anniversary>,
    contacts: Vec<Contact>,
    pings: Vec<Ping>,
    daily_picks: HashMap<NaiveDate, DailyPick>,
}

/// Ephemeral store keeping every user's rows in memory.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, UserData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn upsert_by_id<T>(rows: &mut Vec<T>, row: T, id: impl Fn(&T) -> &str) {
    match rows.iter_mut().find(|r| id(r) == id(&row)) {
        Some(existing) => *existing = row,
        None => rows.push(row),
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn list_anniversaries(&self, user_id: &str) -> Result<Vec<Anniversary>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|u| u.anniversaries.clone())
            .unwrap_or_default())
    }

    async fn upsert_anniversary(
        &self,
        user_id: &str,
        ann: &Anniversary,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let data = users.entry(user_id.to_string()).or_default();
        upsert_by_id(&mut data.anniversaries, ann.clone(), |a| a.id.as_str());
        Ok(())
    }

    async fn delete_anniversary(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(data) = users.get_mut(user_id) else {
            return Ok(false);
        };
        let before = data.anniversaries.len();
        data.anniversaries.retain(|a| a.id != id);
        Ok(data.anniversaries.len() != before)
    }

    async fn list_contacts(&self, user_id: &str) -> Result<Vec<Contact>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|u| u.contacts.clone())
            .unwrap_or_default())
    }

    async fn upsert_contact(&self, user_id: &str, contact: &Contact) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let data = users.entry(user_id.to_string()).or_default();
        upsert_by_id(&mut data.contacts, contact.clone(), |c| c.id.as_str());
        Ok(())
    }

    async fn delete_contact(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let Some(data) = users.get_mut(user_id) else {
            return Ok(false);
        };
        let before = data.contacts.len();
        data.contacts.retain(|c| c.id != id);
        data.pings.retain(|p| p.contact_id != id);
        Ok(data.contacts.len() != before)
    }

    async fn record_ping(&self, user_id: &str, ping: &Ping) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let contact = users
            .get_mut(user_id)
            .and_then(|data| data.contacts.iter_mut().find(|c| c.id == ping.contact_id))
            .ok_or_else(|| StoreError::NotFound(format!("contact {}", ping.contact_id)))?;
        contact.last_contacted_at = Some(ping.at);
        if let Some(data) = users.get_mut(user_id) {
            data.pings.push(ping.clone());
        }
        Ok(())
    }

    async fn list_pings(&self, user_id: &str, contact_id: &str) -> Result<Vec<Ping>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .map(|u| {
                u.pings
                    .iter()
                    .filter(|p| p.contact_id == contact_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_daily_pick(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyPick>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(user_id)
            .and_then(|u| u.daily_picks.get(&date))
            .cloned())
    }

    async fn insert_daily_pick(&self, pick: &DailyPick) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let data = users.entry(pick.user_id.clone()).or_default();
        if data.daily_picks.contains_key(&pick.pick_date) {
            return Err(StoreError::Conflict(format!(
                "daily pick for {} on {}",
                pick.user_id, pick.pick_date
            )));
        }
        data.daily_picks.insert(pick.pick_date, pick.clone());
        Ok(())
    }
}
