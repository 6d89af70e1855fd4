//! Storage module for persisting crawl data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The deduplicated page frontier
//! - The single-row run state
//! - The activity log

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::PageStatus;
use crate::MirrorError;
use serde::Serialize;
use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(MirrorError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, MirrorError> {
    SqliteStorage::new(path)
}

/// Represents a page in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRecord {
    pub id: i64,
    pub url: String,
    pub status: PageStatus,
    pub http_status_code: Option<u16>,
    pub content_type: Option<String>,

    /// Path of the written file, relative to the working tree
    pub file_path: Option<String>,
    pub error_message: Option<String>,

    /// URL of the page this one was first referenced from
    pub found_on: Option<String>,
    pub discovered_at: String,
    pub checked_at: Option<String>,
}

/// The result of fetching one page, as recorded by `mark_checked`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub status: PageStatus,
    pub http_status_code: Option<u16>,
    pub content_type: Option<String>,
    pub file_path: Option<String>,
    pub error_message: Option<String>,
}

impl CheckOutcome {
    pub fn success(
        http_status_code: u16,
        content_type: Option<String>,
        file_path: Option<String>,
    ) -> Self {
        Self {
            status: PageStatus::CheckedSuccess,
            http_status_code: Some(http_status_code),
            content_type,
            file_path,
            error_message: None,
        }
    }

    pub fn error(http_status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status: PageStatus::CheckedError,
            http_status_code,
            content_type: None,
            file_path: None,
            error_message: Some(message.into()),
        }
    }
}

/// One line of the activity log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub id: i64,

    /// Phase the entry belongs to (`setup`, `fetch`, `package`, `cancel`, ...)
    pub key: String,
    pub message: String,
    pub created_at: String,
}
