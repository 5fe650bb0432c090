//! The storage capability shared by every backend.

use async_trait::async_trait;
use chrono::NaiveDate;
use ritual_core::{Anniversary, Contact, DailyPick, Ping};

use crate::StoreError;

/// Row storage for one user's data.
///
/// Implementations are chosen once at construction (in-memory, DuckDB, or the
/// hosted backend) and passed around as `&dyn Storage`. Writes are
/// last-write-wins per row; only [`insert_daily_pick`](Self::insert_daily_pick)
/// refuses to overwrite.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn list_anniversaries(&self, user_id: &str) -> Result<Vec<Anniversary>, StoreError>;

    /// Insert or replace an anniversary by id.
    async fn upsert_anniversary(&self, user_id: &str, ann: &Anniversary)
    -> Result<(), StoreError>;

    /// Returns `false` when no such anniversary existed.
    async fn delete_anniversary(&self, user_id: &str, id: &str) -> Result<bool, StoreError>;

    async fn list_contacts(&self, user_id: &str) -> Result<Vec<Contact>, StoreError>;

    /// Insert or replace a contact by id.
    async fn upsert_contact(&self, user_id: &str, contact: &Contact) -> Result<(), StoreError>;

    /// Returns `false` when no such contact existed.
    async fn delete_contact(&self, user_id: &str, id: &str) -> Result<bool, StoreError>;

    /// Log a ping and move the contact's `last_contacted_at` to `ping.at`.
    ///
    /// Fails with [`StoreError::NotFound`] for an unknown contact.
    async fn record_ping(&self, user_id: &str, ping: &Ping) -> Result<(), StoreError>;

    async fn list_pings(&self, user_id: &str, contact_id: &str) -> Result<Vec<Ping>, StoreError>;

    async fn get_daily_pick(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyPick>, StoreError>;

    /// Store the pick for `(pick.user_id, pick.pick_date)`.
    ///
    /// Fails with [`StoreError::Conflict`] if a pick already exists for that
    /// key; the existing row is left untouched.
    async fn insert_daily_pick(&self, pick: &DailyPick) -> Result<(), StoreError>;
}
