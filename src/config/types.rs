use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// Main configuration structure for Static-Mirror
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
}

/// The site being mirrored and where the copy will live
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Scheme and host (optionally port) of the site being crawled
    #[serde(rename = "origin-url")]
    pub origin_url: String,

    /// Scheme used for rewritten links, e.g. "https"
    #[serde(rename = "destination-scheme", default = "default_destination_scheme")]
    pub destination_scheme: String,

    /// Host used for rewritten links, e.g. "static.example.com"
    #[serde(rename = "destination-host", default)]
    pub destination_host: String,

    /// Whether origin links become absolute destination links or relative paths
    #[serde(rename = "link-style", default)]
    pub link_style: LinkStyle,

    /// Extra URLs to seed the crawl with, beyond the homepage
    #[serde(rename = "additional-urls", default)]
    pub additional_urls: Vec<String>,

    /// Files or directories copied verbatim into the output tree
    #[serde(rename = "additional-files", default)]
    pub additional_files: Vec<PathBuf>,

    /// Directories that additional files must live under
    #[serde(rename = "allowed-file-roots", default)]
    pub allowed_file_roots: Vec<PathBuf>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of pages fetched per `continue` call
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: u32,

    /// Maximum number of concurrent fetches within one batch
    #[serde(rename = "concurrency", default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// User agent sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Treat URLs that differ only by query string as distinct pages
    #[serde(rename = "keep-query-strings", default)]
    pub keep_query_strings: bool,

    /// Delay between `continue` calls when the CLI drives a whole run
    #[serde(rename = "poll-interval-ms", default)]
    pub poll_interval_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
            keep_query_strings: false,
            poll_interval_ms: 0,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file holding the frontier
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory for the working tree and the finished zip archive
    #[serde(rename = "temp-files-dir")]
    pub temp_files_dir: PathBuf,

    /// How the finished archive is handed over
    #[serde(rename = "delivery-method", default)]
    pub delivery_method: DeliveryMethod,

    /// Destination directory for the `local` delivery method
    #[serde(rename = "local-dir", default)]
    pub local_dir: Option<PathBuf>,

    /// Remove the working tree once the artifact has been produced
    #[serde(rename = "delete-temp-files", default = "default_true")]
    pub delete_temp_files: bool,
}

/// Delivery method for the finished archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// Compress the tree into a single zip file under the temp directory
    #[default]
    Zip,
    /// Copy the tree into the configured local directory
    Local,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Local => "local",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How references to the origin are rewritten in exported HTML and CSS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStyle {
    /// `http://origin/x` becomes `<destination-scheme>://<destination-host>/x`
    #[default]
    Absolute,
    /// `http://origin/x` becomes a path relative to the file being written
    Relative,
}

impl LinkStyle {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "absolute" => Some(Self::Absolute),
            "relative" => Some(Self::Relative),
            _ => None,
        }
    }
}

fn default_destination_scheme() -> String {
    "https".to_string()
}

fn default_batch_size() -> u32 {
    20
}

fn default_concurrency() -> u32 {
    4
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("static-mirror/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}
