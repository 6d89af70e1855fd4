//! Application context
//!
//! One value holding the configuration and every collaborator a run needs.
//! It is built once per process and handed to the [`ArchiveManager`].
//!
//! [`ArchiveManager`]: crate::archive::ArchiveManager

use crate::config::Config;
use crate::crawler::{Fetcher, HttpFetcher};
use crate::fs::{FileSystem, LocalFileSystem};
use crate::storage::SqliteStorage;
use crate::MirrorError;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Configuration plus the store, fetcher and file system of a run
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,

    /// SHA-256 of the configuration file, recorded in the run state
    pub config_hash: Option<String>,

    pub storage: Arc<Mutex<SqliteStorage>>,
    pub fetcher: Arc<dyn Fetcher>,
    pub fs: Arc<dyn FileSystem>,
}

impl AppContext {
    /// Assembles a context from explicit collaborators
    pub fn new(
        config: Config,
        storage: SqliteStorage,
        fetcher: Arc<dyn Fetcher>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_hash: None,
            storage: Arc::new(Mutex::new(storage)),
            fetcher,
            fs,
        }
    }

    /// Opens the configured database and uses the real HTTP client and disk
    ///
    /// # Arguments
    ///
    /// * `config` - The loaded configuration
    /// * `config_hash` - Hash of the configuration file, if loaded from one
    pub fn open(config: Config, config_hash: Option<String>) -> Result<Self, MirrorError> {
        let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        let fetcher = HttpFetcher::new(&config.crawler)?;

        Ok(Self::new(config, storage, Arc::new(fetcher), Arc::new(LocalFileSystem))
            .with_config_hash(config_hash))
    }

    pub fn with_config_hash(mut self, config_hash: Option<String>) -> Self {
        self.config_hash = config_hash;
        self
    }
}
