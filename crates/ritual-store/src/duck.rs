//! DuckDB storage backend for local (signed-out or offline) use.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use arrow::array::{Array, BooleanArray, Int64Array, LargeStringArray, StringArray, StringViewArray};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::{Connection, params};
use ritual_core::date::format_date;
use ritual_core::{Anniversary, CalendarType, Contact, DailyPick, Ping, PingKind};
use tracing::{debug, info};

use crate::{Storage, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS anniversaries (
    user_id      VARCHAR NOT NULL,
    id           VARCHAR NOT NULL,
    title        VARCHAR NOT NULL,
    "date"       VARCHAR NOT NULL,
    "type"       VARCHAR NOT NULL,
    is_recurring BOOLEAN NOT NULL,
    PRIMARY KEY (user_id, id)
);
CREATE TABLE IF NOT EXISTS contacts (
    user_id           VARCHAR NOT NULL,
    id                VARCHAR NOT NULL,
    name              VARCHAR NOT NULL,
    phone             VARCHAR,
    tags              VARCHAR NOT NULL,
    importance        BIGINT,
    birthday          VARCHAR,
    anniversary       VARCHAR,
    last_contacted_at VARCHAR,
    PRIMARY KEY (user_id, id)
);
CREATE TABLE IF NOT EXISTS contact_pings (
    user_id    VARCHAR NOT NULL,
    contact_id VARCHAR NOT NULL,
    kind       VARCHAR NOT NULL,
    "at"       VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS daily_picks (
    user_id   VARCHAR NOT NULL,
    pick_date VARCHAR NOT NULL,
    picks     VARCHAR NOT NULL,
    PRIMARY KEY (user_id, pick_date)
);
"#;

/// Tables owned by [`DuckStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Anniversaries,
    Contacts,
    ContactPings,
    DailyPicks,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anniversaries => "anniversaries",
            Self::Contacts => "contacts",
            Self::ContactPings => "contact_pings",
            Self::DailyPicks => "daily_picks",
        }
    }
}

/// DuckDB-backed [`Storage`].
///
/// Tags and pick lists are stored as JSON text, timestamps as RFC 3339.
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and
/// [`open_persistent`](Self::open_persistent) for a database file that
/// survives across process restarts.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened local store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Other(format!("mutex poisoned: {e}")))
    }

    // ── Counts ──

    /// Number of rows in `table` belonging to `user_id`.
    pub fn count_rows(&self, table: Table, user_id: &str) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let table = table.as_str();
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table} WHERE user_id = ?");
        let mut stmt = conn.prepare(&sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([user_id])?.collect();
        let batch = batches.first().ok_or_else(|| StoreError::NotFound(table.into()))?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    // ── Anniversaries ──

    fn anniversaries(&self, user_id: &str) -> Result<Vec<Anniversary>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, title, "date", "type", is_recurring
               FROM anniversaries WHERE user_id = ? ORDER BY id"#,
        )?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([user_id])?.collect();

        let mut rows = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let calendar = required_string(batch, "type", row)?
                    .parse::<CalendarType>()
                    .map_err(StoreError::Other)?;
                rows.push(Anniversary {
                    id: required_string(batch, "id", row)?,
                    title: required_string(batch, "title", row)?,
                    date: required_string(batch, "date", row)?,
                    calendar,
                    is_recurring: bool_at(batch, "is_recurring", row)?.unwrap_or(false),
                });
            }
        }
        Ok(rows)
    }

    fn put_anniversary(&self, user_id: &str, ann: &Anniversary) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO anniversaries VALUES (?, ?, ?, ?, ?, ?)",
            params![
                user_id,
                ann.id,
                ann.title,
                ann.date,
                ann.calendar.as_str(),
                ann.is_recurring
            ],
        )?;
        debug!(user_id, id = %ann.id, "upserted anniversary");
        Ok(())
    }

    fn remove_anniversary(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let n = conn.execute(
            "DELETE FROM anniversaries WHERE user_id = ? AND id = ?",
            params![user_id, id],
        )?;
        Ok(n > 0)
    }

    // ── Contacts ──

    fn contacts(&self, user_id: &str) -> Result<Vec<Contact>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, phone, tags, importance, birthday, anniversary, last_contacted_at
             FROM contacts WHERE user_id = ? ORDER BY id",
        )?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([user_id])?.collect();

        let mut rows = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let tags: Vec<String> = serde_json::from_str(&required_string(batch, "tags", row)?)?;
                let importance = int_at(batch, "importance", row)?
                    .map(|v| u8::try_from(v.clamp(0, 255)).unwrap_or(1));
                let last_contacted_at = string_at(batch, "last_contacted_at", row)?
                    .map(|s| parse_timestamp(&s))
                    .transpose()?;
                rows.push(Contact {
                    id: required_string(batch, "id", row)?,
                    name: required_string(batch, "name", row)?,
                    phone: string_at(batch, "phone", row)?,
                    tags,
                    importance,
                    birthday: string_at(batch, "birthday", row)?,
                    anniversary: string_at(batch, "anniversary", row)?,
                    last_contacted_at,
                });
            }
        }
        Ok(rows)
    }

    fn put_contact(&self, user_id: &str, contact: &Contact) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO contacts VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                user_id,
                contact.id,
                contact.name,
                contact.phone,
                serde_json::to_string(&contact.tags)?,
                contact.importance.map(i64::from),
                contact.birthday,
                contact.anniversary,
                contact.last_contacted_at.map(|t| t.to_rfc3339())
            ],
        )?;
        debug!(user_id, id = %contact.id, "upserted contact");
        Ok(())
    }

    fn remove_contact(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM contact_pings WHERE user_id = ? AND contact_id = ?",
            params![user_id, id],
        )?;
        let n = conn.execute(
            "DELETE FROM contacts WHERE user_id = ? AND id = ?",
            params![user_id, id],
        )?;
        Ok(n > 0)
    }

    // ── Pings ──

    fn log_ping(&self, user_id: &str, ping: &Ping) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let at = ping.at.to_rfc3339();
        let updated = conn.execute(
            "UPDATE contacts SET last_contacted_at = ? WHERE user_id = ? AND id = ?",
            params![at, user_id, ping.contact_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("contact {}", ping.contact_id)));
        }
        conn.execute(
            "INSERT INTO contact_pings VALUES (?, ?, ?, ?)",
            params![user_id, ping.contact_id, ping.kind.as_str(), at],
        )?;
        info!(user_id, contact_id = %ping.contact_id, kind = ping.kind.as_str(), "recorded ping");
        Ok(())
    }

    fn pings(&self, user_id: &str, contact_id: &str) -> Result<Vec<Ping>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT contact_id, kind, "at" FROM contact_pings
               WHERE user_id = ? AND contact_id = ? ORDER BY "at""#,
        )?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([user_id, contact_id])?.collect();

        let mut rows = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                rows.push(Ping {
                    contact_id: required_string(batch, "contact_id", row)?,
                    kind: required_string(batch, "kind", row)?
                        .parse::<PingKind>()
                        .map_err(StoreError::Other)?,
                    at: parse_timestamp(&required_string(batch, "at", row)?)?,
                });
            }
        }
        Ok(rows)
    }

    // ── Daily picks ──

    fn daily_pick(&self, user_id: &str, date: NaiveDate) -> Result<Option<DailyPick>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT picks FROM daily_picks WHERE user_id = ? AND pick_date = ?")?;
        let batches: Vec<RecordBatch> = stmt
            .query_arrow([user_id, format_date(date).as_str()])?
            .collect();

        let Some(batch) = batches.iter().find(|b| b.num_rows() > 0) else {
            return Ok(None);
        };
        let picks: Vec<String> = serde_json::from_str(&required_string(batch, "picks", 0)?)?;
        Ok(Some(DailyPick {
            user_id: user_id.to_string(),
            pick_date: date,
            picks,
        }))
    }

    fn put_daily_pick(&self, pick: &DailyPick) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let date = format_date(pick.pick_date);
        let mut stmt = conn.prepare(
            "SELECT count(*)::BIGINT AS cnt FROM daily_picks WHERE user_id = ? AND pick_date = ?",
        )?;
        let batches: Vec<RecordBatch> = stmt
            .query_arrow([pick.user_id.as_str(), date.as_str()])?
            .collect();
        let existing = batches
            .first()
            .and_then(|b| b.column(0).as_any().downcast_ref::<Int64Array>().map(|c| c.value(0)))
            .unwrap_or(0);
        if existing > 0 {
            return Err(StoreError::Conflict(format!(
                "daily pick for {} on {date}",
                pick.user_id
            )));
        }

        conn.execute(
            "INSERT INTO daily_picks VALUES (?, ?, ?)",
            params![pick.user_id, date, serde_json::to_string(&pick.picks)?],
        )?;
        Ok(())
    }
}

#[async_trait]
impl Storage for DuckStore {
    async fn list_anniversaries(&self, user_id: &str) -> Result<Vec<Anniversary>, StoreError> {
        self.anniversaries(user_id)
    }

    async fn upsert_anniversary(
        &self,
        user_id: &str,
        ann: &Anniversary,
    ) -> Result<(), StoreError> {
        self.put_anniversary(user_id, ann)
    }

    async fn delete_anniversary(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        self.remove_anniversary(user_id, id)
    }

    async fn list_contacts(&self, user_id: &str) -> Result<Vec<Contact>, StoreError> {
        self.contacts(user_id)
    }

    async fn upsert_contact(&self, user_id: &str, contact: &Contact) -> Result<(), StoreError> {
        self.put_contact(user_id, contact)
    }

    async fn delete_contact(&self, user_id: &str, id: &str) -> Result<bool, StoreError> {
        self.remove_contact(user_id, id)
    }

    async fn record_ping(&self, user_id: &str, ping: &Ping) -> Result<(), StoreError> {
        self.log_ping(user_id, ping)
    }

    async fn list_pings(&self, user_id: &str, contact_id: &str) -> Result<Vec<Ping>, StoreError> {
        self.pings(user_id, contact_id)
    }

    async fn get_daily_pick(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyPick>, StoreError> {
        self.daily_pick(user_id, date)
    }

    async fn insert_daily_pick(&self, pick: &DailyPick) -> Result<(), StoreError> {
        self.put_daily_pick(pick)
    }
}

// ── Arrow decoding ──

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a dyn Array, StoreError> {
    batch
        .column_by_name(name)
        .map(|c| &**c)
        .ok_or_else(|| StoreError::Other(format!("missing column {name}")))
}

/// Read a string cell, accepting any of Arrow's UTF-8 layouts.
fn string_at(batch: &RecordBatch, name: &str, row: usize) -> Result<Option<String>, StoreError> {
    let col = column(batch, name)?;
    if col.is_null(row) {
        return Ok(None);
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<StringArray>() {
        Ok(Some(arr.value(row).to_string()))
    } else if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        Ok(Some(arr.value(row).to_string()))
    } else if let Some(arr) = any.downcast_ref::<StringViewArray>() {
        Ok(Some(arr.value(row).to_string()))
    } else {
        Err(StoreError::Other(format!(
            "column {name} is not a string: {:?}",
            col.data_type()
        )))
    }
}

fn required_string(batch: &RecordBatch, name: &str, row: usize) -> Result<String, StoreError> {
    string_at(batch, name, row)?.ok_or_else(|| StoreError::Other(format!("null {name} at row {row}")))
}

fn bool_at(batch: &RecordBatch, name: &str, row: usize) -> Result<Option<bool>, StoreError> {
    let col = column(batch, name)?;
    if col.is_null(row) {
        return Ok(None);
    }
    col.as_any()
        .downcast_ref::<BooleanArray>()
        .map(|arr| Some(arr.value(row)))
        .ok_or_else(|| StoreError::Other(format!("column {name} is not boolean")))
}

fn int_at(batch: &RecordBatch, name: &str, row: usize) -> Result<Option<i64>, StoreError> {
    let col = column(batch, name)?;
    if col.is_null(row) {
        return Ok(None);
    }
    col.as_any()
        .downcast_ref::<Int64Array>()
        .map(|arr| Some(arr.value(row)))
        .ok_or_else(|| StoreError::Other(format!("column {name} is not i64")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Other(format!("bad timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ann(id: &str, calendar: CalendarType) -> Anniversary {
        Anniversary {
            id: id.into(),
            title: format!("title {id}"),
            date: "1990-12-25".into(),
            calendar,
            is_recurring: true,
        }
    }

    fn full_contact() -> Contact {
        Contact {
            id: "c1".into(),
            name: "Jisoo".into(),
            phone: Some("010-1234-5678".into()),
            tags: vec!["family".into(), "seoul".into()],
            importance: Some(3),
            birthday: Some("1995-06-20".into()),
            anniversary: None,
            last_contacted_at: Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()),
        }
    }

    #[test]
    fn open_in_memory_creates_schema() {
        let store = DuckStore::open().unwrap();
        assert_eq!(store.count_rows(Table::Anniversaries, "u1").unwrap(), 0);
        assert_eq!(store.count_rows(Table::DailyPicks, "u1").unwrap(), 0);
    }

    #[tokio::test]
    async fn anniversaries_round_trip_through_duckdb() {
        let store = DuckStore::open().unwrap();
        store
            .upsert_anniversary("u1", &ann("a1", CalendarType::Lunar))
            .await
            .unwrap();
        store
            .upsert_anniversary("u1", &ann("a2", CalendarType::Solar))
            .await
            .unwrap();
        store
            .upsert_anniversary("u2", &ann("a3", CalendarType::Solar))
            .await
            .unwrap();

        let rows = store.list_anniversaries("u1").await.unwrap();
        assert_eq!(rows, vec![ann("a1", CalendarType::Lunar), ann("a2", CalendarType::Solar)]);

        assert!(store.delete_anniversary("u1", "a1").await.unwrap());
        assert!(!store.delete_anniversary("u1", "a1").await.unwrap());
        assert_eq!(store.count_rows(Table::Anniversaries, "u1").unwrap(), 1);
    }

    #[tokio::test]
    async fn contacts_keep_nullable_fields() {
        let store = DuckStore::open().unwrap();
        store.upsert_contact("u1", &full_contact()).await.unwrap();
        store
            .upsert_contact("u1", &Contact::new("c2", "Minho"))
            .await
            .unwrap();

        let rows = store.list_contacts("u1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], full_contact());
        assert_eq!(rows[1], Contact::new("c2", "Minho"));
    }

    #[tokio::test]
    async fn deleting_contact_drops_its_pings() {
        let store = DuckStore::open().unwrap();
        store.upsert_contact("u1", &full_contact()).await.unwrap();
        let ping = Ping {
            contact_id: "c1".into(),
            kind: PingKind::Call,
            at: Utc.with_ymd_and_hms(2025, 6, 15, 3, 0, 0).unwrap(),
        };
        store.record_ping("u1", &ping).await.unwrap();
        assert_eq!(store.count_rows(Table::ContactPings, "u1").unwrap(), 1);

        assert!(store.delete_contact("u1", "c1").await.unwrap());
        assert_eq!(store.count_rows(Table::Contacts, "u1").unwrap(), 0);
        assert_eq!(store.count_rows(Table::ContactPings, "u1").unwrap(), 0);
    }

    #[tokio::test]
    async fn ping_moves_last_contacted() {
        let store = DuckStore::open().unwrap();
        store.upsert_contact("u1", &full_contact()).await.unwrap();

        let at = Utc.with_ymd_and_hms(2025, 6, 15, 3, 0, 0).unwrap();
        let ping = Ping {
            contact_id: "c1".into(),
            kind: PingKind::Share,
            at,
        };
        store.record_ping("u1", &ping).await.unwrap();

        let rows = store.list_contacts("u1").await.unwrap();
        assert_eq!(rows[0].last_contacted_at, Some(at));
        assert_eq!(store.list_pings("u1", "c1").await.unwrap(), vec![ping]);

        let missing = Ping {
            contact_id: "ghost".into(),
            kind: PingKind::Call,
            at,
        };
        assert!(matches!(
            store.record_ping("u1", &missing).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn daily_pick_conflicts_on_second_insert() {
        let store = DuckStore::open().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let pick = DailyPick {
            user_id: "u1".into(),
            pick_date: date,
            picks: vec!["c1".into(), "c2".into(), "c3".into()],
        };
        assert_eq!(store.get_daily_pick("u1", date).await.unwrap(), None);
        store.insert_daily_pick(&pick).await.unwrap();
        assert!(matches!(
            store.insert_daily_pick(&pick).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.get_daily_pick("u1", date).await.unwrap(), Some(pick));
    }

    // ── Persistent storage tests ──

    #[tokio::test]
    async fn persistent_store_survives_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("ritual.duckdb");

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(db_path.exists());
        store
            .upsert_anniversary("u1", &ann("a1", CalendarType::Solar))
            .await
            .unwrap();
        store.upsert_contact("u1", &full_contact()).await.unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert_eq!(store.list_anniversaries("u1").await.unwrap().len(), 1);
        assert_eq!(store.list_contacts("u1").await.unwrap(), vec![full_contact()]);
    }
}
