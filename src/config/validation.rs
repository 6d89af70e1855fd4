use crate::config::types::{Config, CrawlerConfig, DeliveryMethod, OutputConfig, SiteConfig};
use crate::fs::FileSystem;
use crate::url::is_local;
use crate::ConfigError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Validates the structure of the configuration at load time
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the site section
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    parse_origin(&config.origin_url)?;

    let scheme = config.destination_scheme.trim_end_matches("://");
    if scheme != "http" && scheme != "https" {
        return Err(ConfigError::Validation(format!(
            "destination_scheme must be http or https, got '{}'",
            config.destination_scheme
        )));
    }

    if config.destination_host.contains('/') {
        return Err(ConfigError::Validation(format!(
            "destination_host must be a bare host, got '{}'",
            config.destination_host
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and 1000, got {}",
            config.batch_size
        )));
    }

    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Parses the origin URL, reducing it to scheme, host and port
pub fn parse_origin(origin: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(origin.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid origin_url '{}': {}", origin, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "origin_url '{}' must use http or https",
            origin
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(format!(
            "origin_url '{}' has no host",
            origin
        )));
    }

    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Per-field report of configuration problems that block a run
///
/// Keys are configuration field names, values the messages for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequirementReport {
    errors: BTreeMap<String, Vec<String>>,
}

impl RequirementReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages recorded for one field
    pub fn errors_for(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), RequirementReport> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for RequirementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (field, messages) in &self.errors {
            for message in messages {
                writeln!(f, "  {}: {}", field, message)?;
            }
        }
        Ok(())
    }
}

/// Checks everything a run needs before it may start
///
/// Unlike [`validate`], this looks at the environment: directories must exist
/// and be writable, seed URLs must belong to the origin and additional files
/// must sit under an allowed root.
pub fn check_requirements(config: &Config, fs: &dyn FileSystem) -> RequirementReport {
    let mut report = RequirementReport::new();

    if config.site.destination_host.trim().is_empty() {
        report.add("destination_host", "Destination host cannot be blank");
    }

    check_directory(
        fs,
        &config.output.temp_files_dir,
        "temp_files_dir",
        "Temporary files directory",
        &mut report,
    );

    if config.output.delivery_method == DeliveryMethod::Local {
        match &config.output.local_dir {
            Some(dir) => check_directory(fs, dir, "local_dir", "Local directory", &mut report),
            None => report.add("local_dir", "Local directory cannot be blank"),
        }
    }

    match parse_origin(&config.site.origin_url) {
        Ok(origin) => {
            for raw in &config.site.additional_urls {
                match Url::parse(raw.trim()) {
                    Ok(url) if is_local(&url, &origin) => {}
                    _ => report.add(
                        "additional_urls",
                        format!("Additional URL does not start with {}: {}", origin, raw),
                    ),
                }
            }
        }
        Err(e) => report.add("origin_url", e.to_string()),
    }

    for file in &config.site.additional_files {
        if find_allowed_root(file, &config.site.allowed_file_roots).is_none() {
            let roots = config
                .site
                .allowed_file_roots
                .iter()
                .map(|r| r.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            report.add(
                "additional_files",
                format!(
                    "Additional file or directory is not located within an allowed directory: {} (allowed: {})",
                    file.display(),
                    roots
                ),
            );
        } else if !fs.exists(file) {
            report.add(
                "additional_files",
                format!("Additional file or directory does not exist: {}", file.display()),
            );
        }
    }

    report
}

/// Returns the allowed root a file lives under, if any
///
/// Both sides are cleaned with [`clean_path`] first, so a `..` cannot walk a
/// file out of its root. The returned root is the cleaned one.
pub fn find_allowed_root(file: &Path, roots: &[PathBuf]) -> Option<PathBuf> {
    let file = clean_path(file)?;
    roots
        .iter()
        .filter(|root| !root.as_os_str().is_empty())
        .filter_map(|root| clean_path(root))
        .find(|root| file.starts_with(root))
}

/// Resolves `.` and `..` components without touching the disk
///
/// Returns `None` when a `..` would climb above the start of the path.
pub fn clean_path(path: &Path) -> Option<PathBuf> {
    let mut cleaned = PathBuf::new();
    let mut depth = 0usize;

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                cleaned.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                cleaned.push(part);
                depth += 1;
            }
            Component::RootDir | Component::Prefix(_) => cleaned.push(component.as_os_str()),
        }
    }

    Some(cleaned)
}

fn check_directory(
    fs: &dyn FileSystem,
    dir: &Path,
    field: &str,
    label: &str,
    report: &mut RequirementReport,
) {
    if dir.as_os_str().is_empty() {
        report.add(field, format!("{} cannot be blank", label));
    } else if !fs.is_dir(dir) {
        report.add(field, format!("{} does not exist: {}", label, dir.display()));
    } else if !fs.is_writable(dir) {
        report.add(field, format!("{} is not writeable: {}", label, dir.display()));
    }
}
