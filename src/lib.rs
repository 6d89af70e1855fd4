//! Static-Mirror: turns a dynamically rendered site into a static copy
//!
//! This crate crawls a site from a seed set, discovers linked resources in HTML
//! and CSS, fetches every local resource, rewrites internal links for the new
//! hosting location and packages the result as a zip archive or a directory tree.
//! Work is sliced into bounded batches driven by repeated `continue` calls so a
//! crawl can be resumed across process invocations.

pub mod archive;
pub mod config;
pub mod context;
pub mod crawler;
pub mod extract;
pub mod fs;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Static-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration requirements not met:\n{0}")]
    Requirements(config::RequirementReport),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] archive::ArchiveError),

    #[error("Cannot {action} while the archive is {state}")]
    InvalidAction {
        action: state::Action,
        state: state::ArchiveState,
    },

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing option: {0}")]
    MissingOption(String),

    #[error("Invalid value for option {key}: {value}")]
    InvalidOption { key: String, value: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Static-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

// Re-export commonly used types
pub use archive::{ArchiveCreator, ArchiveManager, ControlResponse};
pub use config::Config;
pub use context::AppContext;
pub use state::{Action, ArchiveState, PageStatus, RunState};
pub use url::{extract_domain, is_local, normalize_url, resolve_reference};
