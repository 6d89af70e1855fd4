//! Archive module: the run state machine and the static copy it produces
//!
//! - `manager`: drives a run through FETCHING, PACKAGING and DONE
//! - `creator`: writes fetched resources and packages the tree
//! - `paths`: URL to file path mapping
//! - `rewrite`: origin link rewriting

mod creator;
mod manager;
mod paths;
mod rewrite;

pub use creator::{artifact_path, ArchiveCreator};
pub use manager::{ArchiveManager, ControlResponse};
pub use paths::{local_path_for, path_to_root, INDEX_FILE};
pub use rewrite::{LinkRewriter, LinkTarget};

use crate::ConfigError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while writing or packaging the static copy
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid origin: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid rewrite pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Local directory is not configured")]
    MissingLocalDir,

    #[error("Local directory unavailable: {0}")]
    LocalDirUnavailable(String),

    #[error("Not located within an allowed directory: {}", .0.display())]
    OutsideAllowedRoots(PathBuf),

    #[error("Invalid artifact name: {0}")]
    InvalidArtifactName(String),
}

impl ArchiveError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
