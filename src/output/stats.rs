//! Statistics generation from the page store
//!
//! This module provides functionality for extracting and displaying
//! mirror statistics from the storage layer.

use crate::state::{PageStatus, RunState};
use crate::storage::{Storage, StorageResult};
use std::collections::{BTreeMap, HashMap};

/// Mirror statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of pages discovered
    pub total_pages: u64,

    /// Count of pages by status
    pub pages_by_status: HashMap<PageStatus, u64>,

    /// Failed pages grouped by HTTP status code (0 when the server never answered)
    pub error_summary: BTreeMap<u16, u64>,

    /// The current run
    pub run: RunState,
}

impl CrawlStatistics {
    pub fn count(&self, status: PageStatus) -> u64 {
        self.pages_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    let total_pages = storage.count_total()?;

    let mut pages_by_status = HashMap::new();
    for status in PageStatus::all_statuses() {
        let count = storage.count_by_status(status)?;
        if count > 0 {
            pages_by_status.insert(status, count);
        }
    }

    let mut error_summary = BTreeMap::new();
    for page in storage.all_pages()? {
        if page.status.is_error() {
            *error_summary.entry(page.http_status_code.unwrap_or(0)).or_insert(0) += 1;
        }
    }

    Ok(CrawlStatistics {
        total_pages,
        pages_by_status,
        error_summary,
        run: storage.load_run_state()?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Mirror Statistics ===\n");

    println!("Run:");
    println!("  State: {}", stats.run.state);
    if let Some(name) = &stats.run.archive_name {
        println!("  Archive: {}", name);
    }
    if let Some(started) = stats.run.started_at {
        println!("  Started: {}", started.to_rfc3339());
    }
    if let Some(finished) = stats.run.finished_at {
        println!("  Finished: {}", finished.to_rfc3339());
    }
    if let Some(artifact) = &stats.run.artifact_path {
        println!("  Artifact: {}", artifact);
    }
    if let Some(error) = &stats.run.error_message {
        println!("  Error: {}", error);
    }
    println!();

    println!("Pages by Status:");
    println!("  Total pages discovered: {}", stats.total_pages);
    for status in PageStatus::all_statuses() {
        let count = stats.count(status);
        println!("  {}: {} ({:.1}%)", status, count, percentage(count, stats.total_pages));
    }
    println!();

    if !stats.error_summary.is_empty() {
        println!("Error Summary:");
        for (code, count) in &stats.error_summary {
            match code {
                0 => println!("  no response: {}", count),
                code => println!("  HTTP {}: {}", code, count),
            }
        }
        println!();
    }

    let succeeded = stats.count(PageStatus::CheckedSuccess);
    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully fetched)",
        percentage(succeeded, stats.total_pages),
        succeeded,
        stats.total_pages
    );
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
