//! Bounded parallel fetching of one batch of pages

use crate::crawler::fetcher::{FetchError, FetchResult, Fetcher};
use crate::storage::PageRecord;
use std::sync::Arc;
use tokio::sync::Semaphore;
use url::Url;

/// Outcome of fetching one page of a batch
#[derive(Debug)]
pub struct BatchItem {
    pub page: PageRecord,
    pub result: Result<FetchResult, FetchError>,
}

/// Fetches every page of a batch with at most `concurrency` requests in flight
///
/// Results come back in the order of `pages`, whatever order the requests
/// completed in. A page whose URL cannot be parsed, or whose task panicked,
/// yields a `FetchError::Network`.
pub async fn fetch_batch(
    fetcher: Arc<dyn Fetcher>,
    pages: Vec<PageRecord>,
    concurrency: usize,
) -> Vec<BatchItem> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(pages.len());

    for page in pages {
        let fetcher = Arc::clone(&fetcher);
        let sem = Arc::clone(&semaphore);
        let url = page.url.clone();

        let handle = tokio::spawn(async move {
            let _permit = sem
                .acquire()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            let url = Url::parse(&url).map_err(|e| FetchError::Network(e.to_string()))?;
            tracing::debug!("Fetching {}", url);
            fetcher.fetch(&url).await
        });

        handles.push((page, handle));
    }

    let mut items = Vec::with_capacity(handles.len());
    for (page, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Fetch task for {} failed: {}", page.url, e);
                Err(FetchError::Network(format!("fetch task failed: {}", e)))
            }
        };
        items.push(BatchItem { page, result });
    }

    items
}
