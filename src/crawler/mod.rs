//! Crawler module for fetching pages
//!
//! This module contains:
//! - The `Fetcher` seam and its `reqwest` implementation
//! - Bounded parallel fetching of a batch of pages

mod batch;
mod fetcher;

pub use batch::{fetch_batch, BatchItem};
pub use fetcher::{build_http_client, FetchError, FetchResult, Fetcher, HttpFetcher, MAX_REDIRECTS};
