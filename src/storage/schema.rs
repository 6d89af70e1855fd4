//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Static-Mirror database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- The crawl frontier: one row per discovered URL
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL,
    http_status_code INTEGER,
    content_type TEXT,
    file_path TEXT,
    error_message TEXT,
    found_on TEXT,
    discovered_at TEXT NOT NULL,
    checked_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);

-- The current run; always a single row
CREATE TABLE IF NOT EXISTS run_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    state TEXT NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    remaining INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    finished_at TEXT,
    archive_name TEXT,
    config_hash TEXT,
    artifact_path TEXT,
    error_message TEXT
);

-- Progress messages shown to the operator
CREATE TABLE IF NOT EXISTS activity_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key TEXT NOT NULL,
    message TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
