//! Export listing of every page in the frontier

use crate::state::PageStatus;
use crate::storage::{PageRecord, Storage, StorageResult};
use serde::Serialize;

/// One page as reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub url: String,
    pub status: PageStatus,
    pub http_status_code: Option<u16>,
    pub content_type: Option<String>,
    pub file_path: Option<String>,
    pub error_message: Option<String>,
    pub found_on: Option<String>,
}

impl From<PageRecord> for ExportRow {
    fn from(page: PageRecord) -> Self {
        Self {
            url: page.url,
            status: page.status,
            http_status_code: page.http_status_code,
            content_type: page.content_type,
            file_path: page.file_path,
            error_message: page.error_message,
            found_on: page.found_on,
        }
    }
}

/// Returns every page in discovery order
pub fn export_pages(storage: &dyn Storage) -> StorageResult<Vec<PageRecord>> {
    storage.all_pages()
}

/// Returns every page as an [`ExportRow`], in discovery order
pub fn export_rows(storage: &dyn Storage) -> StorageResult<Vec<ExportRow>> {
    Ok(export_pages(storage)?
        .into_iter()
        .map(ExportRow::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CheckOutcome, SqliteStorage};

    #[test]
    fn test_export_rows_in_discovery_order() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let home = storage.find_or_create("http://example.org/", None).unwrap();
        storage
            .find_or_create("http://example.org/style.css", Some("http://example.org/"))
            .unwrap();
        storage
            .mark_checked(
                home.id,
                &CheckOutcome::success(200, Some("text/html".to_string()), Some("index.html".to_string())),
            )
            .unwrap();

        let rows = export_rows(&storage).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].url, "http://example.org/");
        assert_eq!(rows[0].status, PageStatus::CheckedSuccess);
        assert_eq!(rows[0].file_path.as_deref(), Some("index.html"));
        assert_eq!(rows[1].status, PageStatus::Unchecked);
        assert_eq!(rows[1].found_on.as_deref(), Some("http://example.org/"));
    }

    #[test]
    fn test_export_row_serializes_status() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.find_or_create("http://example.org/", None).unwrap();

        let json = serde_json::to_value(export_rows(&storage).unwrap()).unwrap();
        assert_eq!(json[0]["status"], "unchecked");
        assert_eq!(json[0]["url"], "http://example.org/");
    }
}
