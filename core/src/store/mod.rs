//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Importers and analyzers call store methods; they never execute SQL.
//!
//! Dates are stored as `YYYY-MM-DD` text, timestamps as RFC 3339 text, so
//! range predicates compare lexicographically.

use crate::{
    error::DeskResult,
    event::{DeskEvent, EventLogEntry},
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod contacts;
mod learning;
mod members;
mod metrics;

pub struct DeskStore {
    conn: Connection,
    path: Option<String>, // None for a private :memory: database
}

impl DeskStore {
    pub fn open(path: &str) -> DeskResult<Self> {
        if path == ":memory:" {
            return Self::in_memory();
        }
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open a private in-memory database (used in tests).
    pub fn in_memory() -> DeskResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Open a second connection to the same database, for work that runs
    /// off the caller's thread. A private in-memory database cannot be
    /// shared, so it yields `None`.
    pub fn reopen(&self) -> DeskResult<Option<Self>> {
        match &self.path {
            Some(p) => Self::open(p).map(Some),
            None => Ok(None),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> DeskResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_members.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_monthly_metrics.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_learning.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_imports_events.sql"))?;
        Ok(())
    }

    // ── Import history ─────────────────────────────────────────

    pub fn insert_import_record(&self, record: &ImportRecord) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO import_record (
                import_id, gym_id, file_hash, total_rows, imported, updated,
                skipped, error_count, errors_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.import_id,
                record.gym_id,
                record.file_hash,
                record.total_rows as i64,
                record.imported as i64,
                record.updated as i64,
                record.skipped as i64,
                record.error_count as i64,
                record.errors_json,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn import_hash_exists(&self, gym_id: &str, file_hash: &str) -> DeskResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM import_record WHERE gym_id = ?1 AND file_hash = ?2 LIMIT 1",
                params![gym_id, file_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn recent_imports(&self, gym_id: &str, limit: usize) -> DeskResult<Vec<ImportRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT import_id, gym_id, file_hash, total_rows, imported, updated,
                    skipped, error_count, errors_json, created_at
             FROM import_record WHERE gym_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![gym_id, limit as i64], |row| {
            Ok(ImportRecord {
                import_id: row.get(0)?,
                gym_id: row.get(1)?,
                file_hash: row.get(2)?,
                total_rows: row.get::<_, i64>(3)? as usize,
                imported: row.get::<_, i64>(4)? as usize,
                updated: row.get::<_, i64>(5)? as usize,
                skipped: row.get::<_, i64>(6)? as usize,
                error_count: row.get::<_, i64>(7)? as usize,
                errors_json: row.get(8)?,
                created_at: timestamp_col(row, 9)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &DeskEvent) -> DeskResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (gym_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.gym_id(),
                event.type_name(),
                serde_json::to_string(event)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_gym(&self, gym_id: &str) -> DeskResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, gym_id, event_type, payload, created_at
             FROM event_log WHERE gym_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![gym_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    gym_id: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

// ── Row types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRecord {
    pub import_id: String,
    pub gym_id: String,
    pub file_hash: String,
    pub total_rows: usize,
    pub imported: usize,
    pub updated: usize,
    pub skipped: usize,
    pub error_count: usize,
    pub errors_json: String,
    pub created_at: DateTime<Utc>,
}

// ── Column helpers ─────────────────────────────────────────────

pub(crate) fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

pub(crate) fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn timestamp_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_timestamp_col(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}
