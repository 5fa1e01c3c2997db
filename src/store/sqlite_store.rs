//! SQLite-backed event store
//!
//! One shared connection behind a mutex serializes writes per record.
//! All statements are parameterized.

use super::types::{
    display_name_from_parts, ActivityEvent, NewSale, Participant, ParticipantProfile, SaleEvent,
    DATE_FORMAT, TIMESTAMP_FORMAT,
};
use super::{EventStore, StoreError};
use crate::report_core::period::DateRange;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sales (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id      INTEGER NOT NULL,
    product_name    TEXT NOT NULL,
    amount          REAL NOT NULL,
    date            TEXT NOT NULL,
    user_id         INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sales_date ON sales(date);

CREATE TABLE IF NOT EXISTS users (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id             INTEGER NOT NULL UNIQUE,
    username            TEXT,
    first_name          TEXT,
    last_name           TEXT,
    registration_date   TEXT NOT NULL,
    last_activity       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_activity (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id         INTEGER NOT NULL,
    action_type     TEXT NOT NULL,
    action_date     TEXT NOT NULL,
    additional_data TEXT
);
CREATE INDEX IF NOT EXISTS idx_activity_date ON user_activity(action_date);
"#;

pub struct SqliteEventStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteEventStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        let store = Self::with_connection(conn)?;
        log::info!("✅ Event store ready at {} (WAL mode)", db_path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn record_sale(&self, sale: NewSale) -> Result<i64, StoreError> {
        if !sale.amount.is_finite() || sale.amount < 0.0 {
            return Err(StoreError::InvalidSale(format!(
                "amount must be a non-negative number, got {}",
                sale.amount
            )));
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sales (product_id, product_name, amount, date, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                sale.product_id,
                sale.product_name,
                sale.amount,
                sale.occurred_on.format(DATE_FORMAT).to_string(),
                sale.actor_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn upsert_participant_at(
        &self,
        profile: &ParticipantProfile,
        at: NaiveDateTime,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO users (user_id, username, first_name, last_name, registration_date, last_activity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                last_activity = MAX(users.last_activity, excluded.last_activity)
            "#,
            params![
                profile.actor_id,
                profile.username,
                profile.first_name,
                profile.last_name,
                at.format(TIMESTAMP_FORMAT).to_string(),
            ],
        )?;
        Ok(())
    }

    async fn record_activity_at(
        &self,
        actor_id: i64,
        action_type: &str,
        metadata: Option<&str>,
        at: NaiveDateTime,
    ) -> Result<i64, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let known = tx
            .prepare("SELECT 1 FROM users WHERE user_id = ?1")?
            .exists([actor_id])?;
        if !known {
            return Err(StoreError::UnknownParticipant(actor_id));
        }

        let stamp = at.format(TIMESTAMP_FORMAT).to_string();
        tx.execute(
            "INSERT INTO user_activity (user_id, action_type, action_date, additional_data)
             VALUES (?1, ?2, ?3, ?4)",
            params![actor_id, action_type, stamp, metadata],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE users SET last_activity = MAX(last_activity, ?1) WHERE user_id = ?2",
            params![stamp, actor_id],
        )?;
        tx.commit()?;

        Ok(id)
    }

    async fn sales_between(&self, range: &DateRange) -> Result<Vec<SaleEvent>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, product_id, product_name, amount, date, user_id
             FROM sales
             WHERE date BETWEEN ?1 AND ?2
             ORDER BY date ASC, id ASC",
        )?;

        let rows = stmt.query_map(
            params![
                range.start().format(DATE_FORMAT).to_string(),
                range.end().format(DATE_FORMAT).to_string(),
            ],
            |row| {
                Ok(SaleEvent {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    product_name: row.get(2)?,
                    amount: row.get(3)?,
                    occurred_on: parse_date(4, &row.get::<_, String>(4)?)?,
                    actor_id: row.get(5)?,
                })
            },
        )?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn activity_between(&self, range: &DateRange) -> Result<Vec<ActivityEvent>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, action_type, action_date, additional_data
             FROM user_activity
             WHERE action_date BETWEEN ?1 AND ?2
             ORDER BY action_date ASC, id ASC",
        )?;

        let from = format!("{} 00:00:00", range.start().format(DATE_FORMAT));
        let to = format!("{} 23:59:59", range.end().format(DATE_FORMAT));

        let rows = stmt.query_map(params![from, to], |row| {
            Ok(ActivityEvent {
                id: row.get(0)?,
                actor_id: row.get(1)?,
                action_type: row.get(2)?,
                occurred_at: parse_timestamp(3, &row.get::<_, String>(3)?)?,
                metadata: row.get(4)?,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn participant(&self, actor_id: i64) -> Result<Option<Participant>, StoreError> {
        let conn = self.lock()?;
        let participant = conn
            .query_row(
                "SELECT user_id, username, first_name, last_name, registration_date, last_activity
                 FROM users WHERE user_id = ?1",
                [actor_id],
                |row| {
                    let username: Option<String> = row.get(1)?;
                    let first_name: Option<String> = row.get(2)?;
                    let last_name: Option<String> = row.get(3)?;
                    Ok(Participant {
                        actor_id: row.get(0)?,
                        display_name: display_name_from_parts(
                            actor_id,
                            username.as_deref(),
                            first_name.as_deref(),
                            last_name.as_deref(),
                        ),
                        first_seen_at: parse_timestamp(4, &row.get::<_, String>(4)?)?,
                        last_active_at: parse_timestamp(5, &row.get::<_, String>(5)?)?,
                    })
                },
            )
            .optional()?;
        Ok(participant)
    }

    async fn clear_sales(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        Ok(conn.execute("DELETE FROM sales", [])?)
    }
}

fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
