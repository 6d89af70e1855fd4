//! Rendering of the activity log

use crate::storage::ActivityEntry;
use chrono::{DateTime, Utc};

/// Formats one entry as `[timestamp] message`
///
/// Timestamps stored as RFC 3339 are shown as `YYYY-MM-DD HH:MM:SS`; anything
/// else is shown verbatim.
pub fn format_entry(entry: &ActivityEntry) -> String {
    let timestamp = DateTime::parse_from_rfc3339(&entry.created_at)
        .map(|t| t.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| entry.created_at.clone());

    format!("[{}] {}", timestamp, entry.message)
}

/// Renders the whole log, one entry per line, oldest first
pub fn render_log(entries: &[ActivityEntry]) -> String {
    entries
        .iter()
        .map(format_entry)
        .collect::<Vec<_>>()
        .join("\n")
}
