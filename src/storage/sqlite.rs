//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{ArchiveState, PageStatus, RunState};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ActivityEntry, CheckOutcome, PageRecord};
use crate::MirrorError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const PAGE_COLUMNS: &str = "id, url, status, http_status_code, content_type, file_path,
     error_message, found_on, discovered_at, checked_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(MirrorError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, MirrorError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, MirrorError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_pages<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let pages = stmt
            .query_map(params, page_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pages)
    }
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        status: PageStatus::from_db_string(&row.get::<_, String>(2)?)
            .unwrap_or(PageStatus::CheckedError),
        http_status_code: row.get(3)?,
        content_type: row.get(4)?,
        file_path: row.get(5)?,
        error_message: row.get(6)?,
        found_on: row.get(7)?,
        discovered_at: row.get(8)?,
        checked_at: row.get(9)?,
    })
}

fn parse_timestamp(value: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StorageError::Serialization(format!("bad timestamp '{}': {}", s, e)))
        })
        .transpose()
}

impl Storage for SqliteStorage {
    // ===== Page Management =====

    fn find_or_create(&mut self, url: &str, found_on: Option<&str>) -> StorageResult<PageRecord> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO pages (url, status, found_on, discovered_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(url) DO NOTHING",
            params![url, PageStatus::Unchecked.to_db_string(), found_on, now],
        )?;

        self.get_page_by_url(url)?
            .ok_or_else(|| StorageError::PageNotFound(url.to_string()))
    }

    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord> {
        let sql = format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS);
        self.conn
            .query_row(&sql, params![page_id], page_from_row)
            .optional()?
            .ok_or_else(|| StorageError::PageNotFound(format!("Page ID {}", page_id)))
    }

    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>> {
        let sql = format!("SELECT {} FROM pages WHERE url = ?1", PAGE_COLUMNS);
        let page = self
            .conn
            .query_row(&sql, params![url], page_from_row)
            .optional()?;
        Ok(page)
    }

    fn next_unchecked(&self, limit: u32) -> StorageResult<Vec<PageRecord>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE status = ?1 ORDER BY id LIMIT ?2",
            PAGE_COLUMNS
        );
        self.query_pages(&sql, params![PageStatus::Unchecked.to_db_string(), limit])
    }

    fn mark_checked(&mut self, page_id: i64, outcome: &CheckOutcome) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE pages SET status = ?1, http_status_code = ?2, content_type = ?3,
             file_path = ?4, error_message = ?5, checked_at = ?6
             WHERE id = ?7 AND status = ?8",
            params![
                outcome.status.to_db_string(),
                outcome.http_status_code,
                outcome.content_type,
                outcome.file_path,
                outcome.error_message,
                now,
                page_id,
                PageStatus::Unchecked.to_db_string()
            ],
        )?;

        if changed == 0 {
            // Distinguish "already checked" from "no such page"
            self.get_page(page_id)?;
        }

        Ok(changed > 0)
    }

    fn all_pages(&self) -> StorageResult<Vec<PageRecord>> {
        let sql = format!("SELECT {} FROM pages ORDER BY id", PAGE_COLUMNS);
        self.query_pages(&sql, [])
    }

    fn reset(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM pages", [])?;
        tx.execute("DELETE FROM activity_log", [])?;
        tx.commit()?;
        Ok(())
    }

    // ===== Statistics =====

    fn count_by_status(&self, status: PageStatus) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE status = ?1",
            params![status.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_total(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run State =====

    fn load_run_state(&self) -> StorageResult<RunState> {
        let row = self
            .conn
            .query_row(
                "SELECT state, processed, remaining, started_at, finished_at, archive_name,
                 config_hash, artifact_path, error_message
                 FROM run_state WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                        row.get::<_, Option<String>>(8)?,
                    ))
                },
            )
            .optional()?;

        let Some((
            state,
            processed,
            remaining,
            started_at,
            finished_at,
            archive_name,
            config_hash,
            artifact_path,
            error_message,
        )) = row
        else {
            return Ok(RunState::default());
        };

        let state = ArchiveState::from_db_string(&state)
            .ok_or_else(|| StorageError::Serialization(format!("unknown state '{}'", state)))?;

        Ok(RunState {
            state,
            processed: processed as u64,
            remaining: remaining as u64,
            started_at: parse_timestamp(started_at)?,
            finished_at: parse_timestamp(finished_at)?,
            archive_name,
            config_hash,
            artifact_path,
            error_message,
        })
    }

    fn save_run_state(&mut self, run: &RunState) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO run_state (id, state, processed, remaining, started_at, finished_at,
             archive_name, config_hash, artifact_path, error_message)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                state = excluded.state,
                processed = excluded.processed,
                remaining = excluded.remaining,
                started_at = excluded.started_at,
                finished_at = excluded.finished_at,
                archive_name = excluded.archive_name,
                config_hash = excluded.config_hash,
                artifact_path = excluded.artifact_path,
                error_message = excluded.error_message",
            params![
                run.state.to_db_string(),
                run.processed as i64,
                run.remaining as i64,
                run.started_at.map(|t| t.to_rfc3339()),
                run.finished_at.map(|t| t.to_rfc3339()),
                run.archive_name,
                run.config_hash,
                run.artifact_path,
                run.error_message,
            ],
        )?;
        Ok(())
    }

    // ===== Activity Log =====

    fn append_log(&mut self, key: &str, message: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO activity_log (key, message, created_at) VALUES (?1, ?2, ?3)",
            params![key, message, now],
        )?;
        Ok(())
    }

    fn log_entries(&self) -> StorageResult<Vec<ActivityEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, key, message, created_at FROM activity_log ORDER BY id")?;

        let entries = stmt
            .query_map([], |row| {
                Ok(ActivityEntry {
                    id: row.get(0)?,
                    key: row.get(1)?,
                    message: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}
