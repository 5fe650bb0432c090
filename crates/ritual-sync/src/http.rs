//! HTTP client for the hosted backend's PostgREST-style table endpoints.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Method, RequestBuilder, Response};
use ritual_core::date::format_date;
use ritual_core::{Anniversary, Contact, DailyPick, Ping};
use ritual_store::{Storage, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info};

const ANNIVERSARIES: &str = "anniversaries";
const CONTACTS: &str = "contacts";
const CONTACT_PINGS: &str = "contact_pings";
const DAILY_PICKS: &str = "daily_picks";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SyncError> for StoreError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Server { status: 409, body } => StoreError::Conflict(body),
            SyncError::Server { status: 404, body } => StoreError::NotFound(body),
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// A row tagged with its owner, as the backend's tables expect.
#[derive(Serialize)]
struct Owned<'a, T> {
    user_id: &'a str,
    #[serde(flatten)]
    row: &'a T,
}

type Filters = Vec<(&'static str, String)>;

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// [`Storage`] backed by the hosted backend.
///
/// Every request carries the project API key; signed-in sessions add the
/// user's access token so row-level policies apply.
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RemoteStore {
    /// Create a client for the given backend base URL.
    ///
    /// `base_url` should be like `https://project.example.co` (no trailing
    /// slash, no `/rest/v1` suffix).
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: String) -> Self {
        self.access_token = Some(token);
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn send(req: RequestBuilder) -> Result<Response, SyncError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &Filters,
    ) -> Result<Vec<T>, SyncError> {
        let req = self
            .request(Method::GET, table)
            .query(&[("select", "*")])
            .query(filters);
        let body = Self::send(req).await?.text().await?;
        let rows: Vec<T> = serde_json::from_str(&body)?;
        debug!(table, count = rows.len(), "selected rows");
        Ok(rows)
    }

    async fn upsert<T: Serialize + Sync>(
        &self,
        table: &str,
        user_id: &str,
        row: &T,
    ) -> Result<(), SyncError> {
        let req = self
            .request(Method::POST, table)
            .header("Prefer", "resolution=merge-duplicates")
            .json(&Owned { user_id, row });
        Self::send(req).await?;
        debug!(table, "upserted row");
        Ok(())
    }

    async fn insert<T: Serialize + Sync>(&self, table: &str, row: &T) -> Result<(), SyncError> {
        let req = self.request(Method::POST, table).json(row);
        Self::send(req).await?;
        Ok(())
    }

    /// PATCH matching rows; returns how many rows changed.
    async fn update(
        &self,
        table: &str,
        filters: &Filters,
        patch: &serde_json::Value,
    ) -> Result<usize, SyncError> {
        let req = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(filters)
            .json(patch);
        let body = Self::send(req).await?.text().await?;
        let rows: Vec<serde_json::Value> = serde_json::from_str(&body)?;
        Ok(rows.len())
    }

    /// DELETE matching rows; returns how many rows were removed.
    async fn delete(&self, table: &str, filters: &Filters) -> Result<usize, SyncError> {
        let req = self
            .request(Method::DELETE, table)
            .header("Prefer", "return=representation")
            .query(filters);
        let body = Self::send(req).await?.text().await?;
        let rows: Vec<serde_json::Value> = serde_json::from_str(&body)?;
        Ok(rows.len())
    }
}

fn by_owner(user_id: &str) -> Filters {
    vec![("user_id", eq(user_id))]
}

fn by_owner_and_id(user_id: &str, id: &str) -> Filters {
    vec![("user_id", eq(user_id)), ("id", eq(id))]
}

/// Deletes issued when removing a contact: its pings first, then the row.
fn contact_deletes(user_id: &str, id: &str) -> [(&'static str, Filters); 2] {
    [
        (
            CONTACT_PINGS,
            vec![("user_id", eq(user_id)), ("contact_id", eq(id))],
        ),
        (CONTACTS, by_owner_and_id(user_id, id)),
    ]
}

#[async_trait]
impl Storage for RemoteStore {
    async fn list_anniversaries(&self, user_id: &str) -> Result<Vec<Anniversary>, StoreError> {
        Ok(self.select(ANNIVERSARIES, &by_owner(user_id)).await?)
    }

    async fn upsert_anniversary(
        &self,
        user_id: &str,
        ann: &Anniversary,
    ) -> Result<(), StoreError> {
        Ok(self.upsert(ANNIVERSARIES, user_id, ann).await?)
    }

    async fn delete_anniversary(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        let removed = self
            .delete(ANNIVERSARIES, &by_owner_and_id(user_id, id))
            .await?;
        Ok(removed > 0)
    }

    async fn list_contacts(&self, user_id: &str) -> Result<Vec<Contact>, StoreError> {
        Ok(self.select(CONTACTS, &by_owner(user_id)).await?)
    }

    async fn upsert_contact(&self, user_id: &str, contact: &Contact) -> Result<(), StoreError> {
        Ok(self.upsert(CONTACTS, user_id, contact).await?)
    }

    async fn delete_contact(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        let [(pings_table, pings), (contacts_table, contact)] = contact_deletes(user_id, id);
        let pings_removed = self.delete(pings_table, &pings).await?;
        let removed = self.delete(contacts_table, &contact).await?;
        debug!(user_id, id, pings_removed, "deleted contact");
        Ok(removed > 0)
    }

    async fn record_ping(&self, user_id: &str, ping: &Ping) -> Result<(), StoreError> {
        let patch = serde_json::json!({ "last_contacted_at": ping.at });
        let updated = self
            .update(CONTACTS, &by_owner_and_id(user_id, &ping.contact_id), &patch)
            .await?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("contact {}", ping.contact_id)));
        }
        self.insert(CONTACT_PINGS, &Owned { user_id, row: ping })
            .await?;
        info!(user_id, contact_id = %ping.contact_id, kind = ping.kind.as_str(), "recorded ping");
        Ok(())
    }

    async fn list_pings(&self, user_id: &str, contact_id: &str) -> Result<Vec<Ping>, StoreError> {
        let filters = vec![
            ("user_id", eq(user_id)),
            ("contact_id", eq(contact_id)),
            ("order", "at.asc".to_string()),
        ];
        Ok(self.select(CONTACT_PINGS, &filters).await?)
    }

    async fn get_daily_pick(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyPick>, StoreError> {
        let filters = vec![
            ("user_id", eq(user_id)),
            ("pick_date", eq(&format_date(date))),
        ];
        let rows: Vec<DailyPick> = self.select(DAILY_PICKS, &filters).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_daily_pick(&self, pick: &DailyPick) -> Result<(), StoreError> {
        // The (user_id, pick_date) unique key makes a second insert a 409.
        self.insert(DAILY_PICKS, pick).await?;
        info!(user_id = %pick.user_id, date = %pick.pick_date, "stored daily pick remotely");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ritual_core::{CalendarType, PingKind};

    #[test]
    fn remote_store_trims_trailing_slash() {
        let store = RemoteStore::new("https://project.example.co/".into(), "key".into());
        assert_eq!(store.base_url, "https://project.example.co");
        assert_eq!(
            store.table_url(CONTACTS),
            "https://project.example.co/rest/v1/contacts"
        );
    }

    #[test]
    fn owned_rows_flatten_user_id() {
        let ann = Anniversary {
            id: "a1".into(),
            title: "Wedding".into(),
            date: "2015-05-02".into(),
            calendar: CalendarType::Solar,
            is_recurring: true,
        };
        let value = serde_json::to_value(Owned {
            user_id: "u1",
            row: &ann,
        })
        .unwrap();
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["id"], "a1");
        assert_eq!(value["type"], "solar");
        assert_eq!(value["is_recurring"], true);
    }

    #[test]
    fn ping_rows_match_table_columns() {
        let ping = Ping {
            contact_id: "c1".into(),
            kind: PingKind::Sms,
            at: Utc.with_ymd_and_hms(2025, 6, 15, 3, 0, 0).unwrap(),
        };
        let value = serde_json::to_value(Owned {
            user_id: "u1",
            row: &ping,
        })
        .unwrap();
        assert_eq!(value["kind"], "sms");
        assert_eq!(value["contact_id"], "c1");
        assert_eq!(value["at"], "2025-06-15T03:00:00Z");
    }

    #[test]
    fn backend_rows_with_extra_columns_deserialise() {
        let body = r#"[{
            "id": "c1",
            "user_id": "u1",
            "name": "Jisoo",
            "phone": null,
            "tags": ["family"],
            "importance": 2,
            "birthday": "1995-06-20",
            "anniversary": null,
            "last_contacted_at": "2025-06-01T09:30:00+00:00",
            "created_at": "2025-01-01T00:00:00+00:00"
        }]"#;
        let rows: Vec<Contact> = serde_json::from_str(body).unwrap();
        assert_eq!(rows[0].importance(), 2);
        assert_eq!(
            rows[0].last_contacted_at,
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn daily_pick_row_deserialises() {
        let body = r#"[{"user_id": "u1", "pick_date": "2025-06-15", "picks": ["c1", "c2", "c3"]}]"#;
        let rows: Vec<DailyPick> = serde_json::from_str(body).unwrap();
        assert_eq!(rows[0].pick_date, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
        assert_eq!(rows[0].picks.len(), 3);
    }

    #[test]
    fn server_errors_map_to_store_errors() {
        let conflict: StoreError = SyncError::Server {
            status: 409,
            body: "duplicate key".into(),
        }
        .into();
        assert!(matches!(conflict, StoreError::Conflict(_)));

        let unavailable: StoreError = SyncError::Server {
            status: 503,
            body: "down".into(),
        }
        .into();
        assert!(matches!(unavailable, StoreError::Backend(_)));
    }

    #[test]
    fn deleting_a_contact_removes_its_pings_first() {
        let [(first, pings), (second, contact)] = contact_deletes("u1", "c1");
        assert_eq!(first, CONTACT_PINGS);
        assert_eq!(
            pings,
            vec![
                ("user_id", "eq.u1".to_string()),
                ("contact_id", "eq.c1".to_string())
            ]
        );
        assert_eq!(second, CONTACTS);
        assert_eq!(contact, by_owner_and_id("u1", "c1"));
    }

    #[test]
    fn filters_use_eq_operator() {
        assert_eq!(
            by_owner_and_id("u1", "c1"),
            vec![("user_id", "eq.u1".to_string()), ("id", "eq.c1".to_string())]
        );
    }
}
