//! Configuration module for Static-Mirror
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! building configuration from key-value option stores, and checking the run-time
//! requirements (directories, seed URLs, additional files) before a run starts.
//!
//! # Example
//!
//! ```no_run
//! use static_mirror::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("mirror.toml")).unwrap();
//! println!("Mirroring {}", config.site.origin_url);
//! ```

mod options;
mod parser;
mod types;
mod validation;

// Re-export types
pub use options::{MapOptions, OptionSource};
pub use types::{
    Config, CrawlerConfig, DeliveryMethod, LinkStyle, OutputConfig, SiteConfig,
};

// Re-export parser and validation functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{
    check_requirements, clean_path, find_allowed_root, parse_origin, RequirementReport,
};

use crate::ConfigError;
use url::Url;

impl Config {
    /// The origin as a URL reduced to scheme, host and port
    pub fn origin(&self) -> Result<Url, ConfigError> {
        parse_origin(&self.site.origin_url)
    }

    /// The destination prefix that replaces the origin in rewritten links
    pub fn destination_url(&self) -> String {
        format!(
            "{}://{}",
            self.site.destination_scheme.trim_end_matches("://"),
            self.site.destination_host.trim_end_matches('/')
        )
    }
}
