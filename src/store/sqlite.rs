//! SQLite-backed item store.
//!
//! One row per item. Instants are stored as integer milliseconds; the rule,
//! reminder and series link are stored as JSON text. Every item also records
//! its series key (`series_id`, `anchor_time`), which is unique, so
//! materializing the same occurrence twice inserts nothing.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::traits::ItemStore;
use crate::domain::{
    CasOutcome, ItemKind, ItemStatus, MaterializationRequest, MaterializeOutcome, SchedulableItem, Stamp, StatusUpdate,
};
use crate::error::{EngineError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    series_id TEXT NOT NULL,
    title TEXT NOT NULL,
    kind TEXT NOT NULL,
    anchor_time INTEGER NOT NULL,
    end_time INTEGER,
    status TEXT NOT NULL,
    completed_at INTEGER,
    cancelled INTEGER NOT NULL DEFAULT 0,
    recurrence TEXT,
    reminder TEXT,
    series TEXT,
    updated_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_items_occurrence ON items(series_id, anchor_time);
CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
"#;

const COLUMNS: &str =
    "id, title, kind, anchor_time, end_time, status, completed_at, cancelled, recurrence, reminder, series";

/// Raw column values of one row
struct ItemRow {
    id: String,
    title: String,
    kind: String,
    anchor_time: i64,
    end_time: Option<i64>,
    status: String,
    completed_at: Option<i64>,
    cancelled: bool,
    recurrence: Option<String>,
    reminder: Option<String>,
    series: Option<String>,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            kind: row.get(2)?,
            anchor_time: row.get(3)?,
            end_time: row.get(4)?,
            status: row.get(5)?,
            completed_at: row.get(6)?,
            cancelled: row.get(7)?,
            recurrence: row.get(8)?,
            reminder: row.get(9)?,
            series: row.get(10)?,
        })
    }

    fn into_item(self) -> Result<SchedulableItem> {
        let kind = match self.kind.as_str() {
            "task" => ItemKind::Task,
            "meeting" => ItemKind::Meeting,
            other => return Err(EngineError::Store(format!("Unknown item kind '{}' for {}", other, self.id))),
        };
        let status = parse_status(&self.status)?;

        Ok(SchedulableItem {
            title: self.title,
            kind,
            anchor_time: from_millis(self.anchor_time)?,
            end_time: self.end_time.map(from_millis).transpose()?,
            status,
            completed_at: self.completed_at.map(from_millis).transpose()?,
            recurrence: self.recurrence.as_deref().map(serde_json::from_str).transpose()?,
            cancelled: self.cancelled,
            reminder: self.reminder.as_deref().map(serde_json::from_str).transpose()?,
            series: self.series.as_deref().map(serde_json::from_str).transpose()?,
            id: self.id,
        })
    }
}

fn parse_status(s: &str) -> Result<ItemStatus> {
    ItemStatus::parse(s).ok_or_else(|| EngineError::Store(format!("Unknown status '{}'", s)))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| EngineError::Store(format!("Timestamp out of range: {}", ms)))
}

fn to_json<T: serde::Serialize>(value: Option<&T>) -> Result<Option<String>> {
    Ok(value.map(serde_json::to_string).transpose()?)
}

/// Item store on a single SQLite connection.
///
/// `rusqlite::Connection` is not `Sync`, so it sits behind a `Mutex`; every
/// operation is a short statement or two and needs exclusive access anyway.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create the database file at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    /// Fresh database that lives as long as the store
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| EngineError::Store(e.to_string()))
    }

    fn insert_row(conn: &Connection, item: &SchedulableItem, or_ignore: bool) -> Result<usize> {
        let verb = if or_ignore { "INSERT OR IGNORE" } else { "INSERT" };
        let sql = format!(
            "{} INTO items ({}, series_id, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            verb, COLUMNS
        );
        let changed = conn.execute(
            &sql,
            params![
                item.id,
                item.title,
                item.kind.to_string(),
                item.anchor_time.timestamp_millis(),
                item.end_time.map(|t| t.timestamp_millis()),
                item.status.as_str(),
                item.completed_at.map(|t| t.timestamp_millis()),
                item.cancelled,
                to_json(item.recurrence.as_ref())?,
                to_json(item.reminder.as_ref())?,
                to_json(item.series.as_ref())?,
                item.template_id(),
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(changed)
    }

    /// Conditional status write; `conn` may be a transaction
    fn cas(conn: &Connection, update: &StatusUpdate) -> Result<CasOutcome> {
        let (stamp_mode, stamp_at) = match update.completed_at {
            Stamp::Keep => ("keep", None),
            Stamp::SetIfUnset(at) => ("set", Some(at.timestamp_millis())),
            Stamp::Clear => ("clear", None),
        };

        let changed = conn.execute(
            r#"
            UPDATE items SET
                status = ?1,
                completed_at = CASE ?2
                    WHEN 'keep' THEN completed_at
                    WHEN 'set' THEN COALESCE(completed_at, ?3)
                    ELSE NULL
                END,
                cancelled = COALESCE(?4, cancelled),
                updated_at = ?5
            WHERE id = ?6 AND status = ?7
            "#,
            params![
                update.status.as_str(),
                stamp_mode,
                stamp_at,
                update.cancelled,
                Utc::now().timestamp_millis(),
                update.id,
                update.expected.as_str(),
            ],
        )?;

        if changed > 0 {
            return Ok(CasOutcome::Applied);
        }

        let actual: Option<String> = conn
            .query_row("SELECT status FROM items WHERE id = ?1", [&update.id], |row| row.get(0))
            .optional()?;
        match actual {
            Some(status) => Ok(CasOutcome::Conflict {
                actual: parse_status(&status)?,
            }),
            None => Ok(CasOutcome::Missing),
        }
    }

    fn query_items(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<SchedulableItem>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, ItemRow::from_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.into_item()?);
        }
        Ok(items)
    }
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn fetch_active(&self, after: Option<&str>, limit: usize) -> Result<Vec<SchedulableItem>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM items \
             WHERE cancelled = 0 AND status IN ('pending', 'in_progress') AND id > ?1 \
             ORDER BY id LIMIT ?2",
            COLUMNS
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Self::query_items(&conn, &sql, params![after.unwrap_or(""), limit])
    }

    async fn get(&self, id: &str) -> Result<Option<SchedulableItem>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM items WHERE id = ?1", COLUMNS);
        let row = conn.query_row(&sql, [id], ItemRow::from_row).optional()?;
        row.map(ItemRow::into_item).transpose()
    }

    async fn insert(&self, item: &SchedulableItem) -> Result<()> {
        let conn = self.lock()?;
        Self::insert_row(&conn, item, false)?;
        Ok(())
    }

    async fn list(&self, status: Option<ItemStatus>) -> Result<Vec<SchedulableItem>> {
        let conn = self.lock()?;
        match status {
            Some(status) => {
                let sql = format!("SELECT {} FROM items WHERE status = ?1 ORDER BY id", COLUMNS);
                Self::query_items(&conn, &sql, [status.as_str()])
            }
            None => {
                let sql = format!("SELECT {} FROM items ORDER BY id", COLUMNS);
                Self::query_items(&conn, &sql, [])
            }
        }
    }

    async fn compare_and_set(&self, update: &StatusUpdate) -> Result<CasOutcome> {
        let conn = self.lock()?;
        Self::cas(&conn, update)
    }

    async fn materialize(&self, request: &MaterializationRequest) -> Result<MaterializeOutcome> {
        let conn = self.lock()?;
        match Self::insert_row(&conn, &request.item, true)? {
            0 => Ok(MaterializeOutcome::AlreadyExists),
            _ => Ok(MaterializeOutcome::Created),
        }
    }

    async fn complete_and_materialize(
        &self,
        update: &StatusUpdate,
        next: &MaterializationRequest,
    ) -> Result<(CasOutcome, Option<MaterializeOutcome>)> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let outcome = Self::cas(&tx, update)?;
        if outcome != CasOutcome::Applied {
            return Ok((outcome, None));
        }
        let created = match Self::insert_row(&tx, &next.item, true)? {
            0 => MaterializeOutcome::AlreadyExists,
            _ => MaterializeOutcome::Created,
        };
        tx.commit()?;
        Ok((outcome, Some(created)))
    }
}
