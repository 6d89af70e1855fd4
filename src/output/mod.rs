//! Output module for reporting on a mirror run
//!
//! This module handles:
//! - Rendering the activity log for progress display
//! - Exporting the page listing
//! - Computing and printing run statistics

mod activity;
mod export;
pub mod stats;

pub use activity::{format_entry, render_log};
pub use export::{export_pages, export_rows, ExportRow};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
