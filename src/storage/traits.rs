//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::{PageStatus, RunState};
use crate::storage::{ActivityEntry, CheckOutcome, PageRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The page store is the deduplicated crawl frontier. A URL appears at most
/// once; rediscovering it returns the existing row untouched.
pub trait Storage {
    // ===== Page Management =====

    /// Returns the page for `url`, inserting it as unchecked if new
    ///
    /// # Arguments
    ///
    /// * `url` - The normalized URL
    /// * `found_on` - URL of the page that referenced it (None for seeds)
    fn find_or_create(&mut self, url: &str, found_on: Option<&str>) -> StorageResult<PageRecord>;

    /// Gets a page by ID
    fn get_page(&self, page_id: i64) -> StorageResult<PageRecord>;

    /// Gets a page by URL
    fn get_page_by_url(&self, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Returns up to `limit` unchecked pages in discovery order
    fn next_unchecked(&self, limit: u32) -> StorageResult<Vec<PageRecord>>;

    /// Records the outcome of fetching a page
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The page moved from unchecked to checked
    /// * `Ok(false)` - The page was already checked; nothing changed
    fn mark_checked(&mut self, page_id: i64, outcome: &CheckOutcome) -> StorageResult<bool>;

    /// Returns every page in discovery order
    fn all_pages(&self) -> StorageResult<Vec<PageRecord>>;

    /// Clears pages and the activity log for a fresh run
    fn reset(&mut self) -> StorageResult<()>;

    // ===== Statistics =====

    /// Counts pages with a given status
    fn count_by_status(&self, status: PageStatus) -> StorageResult<u64>;

    /// Gets total page count
    fn count_total(&self) -> StorageResult<u64>;

    // ===== Run State =====

    /// Loads the current run, or a NOT_STARTED record if none was saved
    fn load_run_state(&self) -> StorageResult<RunState>;

    fn save_run_state(&mut self, run: &RunState) -> StorageResult<()>;

    // ===== Activity Log =====

    /// Appends a progress message under a phase key
    fn append_log(&mut self, key: &str, message: &str) -> StorageResult<()>;

    /// Returns all activity entries, oldest first
    fn log_entries(&self) -> StorageResult<Vec<ActivityEntry>>;
}
