//! Key-value option sources
//!
//! Hosts that keep settings in a generic key-value store (a settings table, an
//! environment, a form submission) can expose them through [`OptionSource`]
//! and build a [`Config`] with [`Config::from_options`]. Keys use the same
//! kebab-case names as the TOML file, prefixed by their section
//! (`site.origin-url`, `output.delivery-method`, ...).

use crate::config::types::{
    Config, CrawlerConfig, DeliveryMethod, LinkStyle, OutputConfig, SiteConfig,
};
use crate::config::validation::validate;
use crate::ConfigError;
use std::collections::HashMap;
use std::path::PathBuf;

/// A read-only key-value store of configuration options
pub trait OptionSource {
    /// Returns the raw value stored under `key`
    fn get(&self, key: &str) -> Option<String>;

    /// Returns a trimmed, non-empty string value
    fn get_str(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Returns a required string value
    fn require_str(&self, key: &str) -> Result<String, ConfigError> {
        self.get_str(key)
            .ok_or_else(|| ConfigError::MissingOption(key.to_string()))
    }

    /// Parses "1"/"true"/"yes"/"on" and "0"/"false"/"no"/"off"
    fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.get_str(key) {
            None => Ok(None),
            Some(v) => match v.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(Some(true)),
                "0" | "false" | "no" | "off" => Ok(Some(false)),
                _ => Err(ConfigError::InvalidOption {
                    key: key.to_string(),
                    value: v,
                }),
            },
        }
    }

    fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        match self.get_str(key) {
            None => Ok(None),
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidOption {
                    key: key.to_string(),
                    value: v,
                }),
        }
    }

    /// Like [`get_u64`](Self::get_u64), rejecting values that do not fit in a `u32`
    fn get_u32(&self, key: &str) -> Result<Option<u32>, ConfigError> {
        match self.get_u64(key)? {
            None => Ok(None),
            Some(v) => u32::try_from(v)
                .map(Some)
                .map_err(|_| ConfigError::InvalidOption {
                    key: key.to_string(),
                    value: v.to_string(),
                }),
        }
    }

    /// Splits a multi-line value into trimmed, non-empty entries
    fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// In-memory option source
#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    values: HashMap<String, String>,
}

impl MapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.to_string(), value.into());
        self
    }
}

impl OptionSource for MapOptions {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl Config {
    /// Builds and validates a configuration from a key-value option source
    pub fn from_options(options: &dyn OptionSource) -> Result<Self, ConfigError> {
        let defaults = CrawlerConfig::default();

        let link_style = match options.get_str("site.link-style") {
            None => LinkStyle::default(),
            Some(v) => LinkStyle::parse(&v).ok_or_else(|| ConfigError::InvalidOption {
                key: "site.link-style".to_string(),
                value: v,
            })?,
        };

        let delivery_method = match options.get_str("output.delivery-method") {
            None => DeliveryMethod::default(),
            Some(v) => DeliveryMethod::parse(&v).ok_or_else(|| ConfigError::InvalidOption {
                key: "output.delivery-method".to_string(),
                value: v,
            })?,
        };

        let config = Config {
            site: SiteConfig {
                origin_url: options.require_str("site.origin-url")?,
                destination_scheme: options
                    .get_str("site.destination-scheme")
                    .unwrap_or_else(|| "https".to_string()),
                destination_host: options
                    .get_str("site.destination-host")
                    .unwrap_or_default(),
                link_style,
                additional_urls: options.get_list("site.additional-urls"),
                additional_files: options
                    .get_list("site.additional-files")
                    .into_iter()
                    .map(PathBuf::from)
                    .collect(),
                allowed_file_roots: options
                    .get_list("site.allowed-file-roots")
                    .into_iter()
                    .map(PathBuf::from)
                    .collect(),
            },
            crawler: CrawlerConfig {
                batch_size: options
                    .get_u32("crawler.batch-size")?
                    .unwrap_or(defaults.batch_size),
                concurrency: options
                    .get_u32("crawler.concurrency")?
                    .unwrap_or(defaults.concurrency),
                request_timeout_secs: options
                    .get_u64("crawler.request-timeout-secs")?
                    .unwrap_or(defaults.request_timeout_secs),
                user_agent: options
                    .get_str("crawler.user-agent")
                    .unwrap_or(defaults.user_agent),
                keep_query_strings: options
                    .get_bool("crawler.keep-query-strings")?
                    .unwrap_or(false),
                poll_interval_ms: options
                    .get_u64("crawler.poll-interval-ms")?
                    .unwrap_or(0),
            },
            output: OutputConfig {
                database_path: options.require_str("output.database-path")?,
                temp_files_dir: PathBuf::from(
                    options
                        .get_str("output.temp-files-dir")
                        .unwrap_or_default(),
                ),
                delivery_method,
                local_dir: options.get_str("output.local-dir").map(PathBuf::from),
                delete_temp_files: options
                    .get_bool("output.delete-temp-files")?
                    .unwrap_or(true),
            },
        };

        validate(&config)?;
        Ok(config)
    }
}
