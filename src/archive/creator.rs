//! Assembles the static copy on disk and packages it
//!
//! Fetched bodies are written under `temp_files_dir/<archive_name>/` as the
//! crawl progresses. Packaging then copies the additional files in and either
//! zips the tree or copies it to the local output directory.

use crate::archive::paths::{local_path_for, to_slash_path};
use crate::archive::rewrite::{LinkRewriter, LinkTarget};
use crate::archive::ArchiveError;
use crate::config::{clean_path, find_allowed_root, Config, DeliveryMethod, LinkStyle};
use crate::crawler::FetchResult;
use crate::extract::{extractor_for, ContentKind};
use crate::fs::FileSystem;
use crate::url::{is_local, resolve_reference};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use url::Url;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Writes fetched pages into the working tree and packages the result
pub struct ArchiveCreator {
    config: Arc<Config>,
    fs: Arc<dyn FileSystem>,
    archive_name: String,
    origin: Url,
    rewriter: LinkRewriter,
}

impl ArchiveCreator {
    /// Creates a creator for one run
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration
    /// * `fs` - File system the tree and artifact are written to
    /// * `archive_name` - Name of the working directory and zip
    pub fn new(
        config: Arc<Config>,
        fs: Arc<dyn FileSystem>,
        archive_name: &str,
    ) -> Result<Self, ArchiveError> {
        let origin = config.origin()?;
        let target = match config.site.link_style {
            LinkStyle::Absolute => LinkTarget::Absolute(config.destination_url()),
            LinkStyle::Relative => LinkTarget::Relative,
        };
        let rewriter = LinkRewriter::new(&origin, target)?;

        Ok(Self {
            config,
            fs,
            archive_name: archive_name.to_string(),
            origin,
            rewriter,
        })
    }

    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    /// `temp_files_dir/<archive_name>`
    pub fn working_dir(&self) -> PathBuf {
        self.config.output.temp_files_dir.join(&self.archive_name)
    }

    /// `temp_files_dir/<archive_name>.zip`
    pub fn zip_path(&self) -> PathBuf {
        self.config
            .output
            .temp_files_dir
            .join(format!("{}.zip", self.archive_name))
    }

    /// Writes one fetched resource into the working tree
    ///
    /// HTML and CSS bodies have their origin links rewritten; everything else
    /// is written byte for byte. Rewriting works on the raw bytes, so the
    /// body's encoding is left as served.
    ///
    /// # Returns
    ///
    /// The path written, relative to the working tree, `/`-separated
    pub fn materialize(&self, url: &Url, fetched: &FetchResult) -> Result<String, ArchiveError> {
        let relative = local_path_for(url);
        let target = self.working_dir().join(&relative);

        let kind = fetched
            .content_type
            .as_deref()
            .and_then(ContentKind::from_content_type);

        let result = match kind {
            Some(kind) => {
                let links = self.query_links(kind, fetched);
                let body = self
                    .rewriter
                    .rewrite_references(&fetched.body, &relative, &links)?;
                let body = self.rewriter.rewrite(&body, &relative);
                self.fs.write(&target, &body)
            }
            None => self.fs.write(&target, &fetched.body),
        };
        result.map_err(|source| ArchiveError::io(&target, source))?;

        tracing::debug!("Wrote {} to {}", url, target.display());
        Ok(to_slash_path(&relative))
    }

    /// Pairs each local, query-bearing reference in a body with the file it
    /// was saved as
    ///
    /// Empty unless query strings are kept. The `&amp;` spelling is listed
    /// too since attribute values come back entity-decoded.
    fn query_links(&self, kind: ContentKind, fetched: &FetchResult) -> Vec<(String, String)> {
        if !self.config.crawler.keep_query_strings {
            return Vec::new();
        }

        let mut links = Vec::new();
        for raw in extractor_for(kind).references(&fetched.text()) {
            let raw = raw.trim();
            if !raw.contains('?') {
                continue;
            }
            let Some(url) = resolve_reference(raw, &fetched.final_url, &self.origin, true) else {
                continue;
            };
            if !is_local(&url, &self.origin) || url.query().map_or(true, str::is_empty) {
                continue;
            }

            let path = local_path_for(&url)
                .components()
                .map(|c| urlencoding::encode(&c.as_os_str().to_string_lossy()).into_owned())
                .collect::<Vec<_>>()
                .join("/");

            if raw.contains('&') {
                links.push((raw.replace('&', "&amp;"), path.clone()));
            }
            links.push((raw.to_string(), path));
        }
        links
    }

    /// Copies each configured additional file or directory into the tree
    ///
    /// Paths are kept relative to the allowed root they live under, so
    /// `/var/www/robots.txt` with root `/var/www` lands at `robots.txt`.
    /// Entries are cleaned of `.` and `..` first; anything that would land
    /// outside the tree is refused.
    ///
    /// # Returns
    ///
    /// Number of files copied
    pub fn copy_additional_files(&self) -> Result<usize, ArchiveError> {
        let working_dir = self.working_dir();
        let mut copied = 0;

        for entry in &self.config.site.additional_files {
            let outside = || ArchiveError::OutsideAllowedRoots(entry.clone());
            let root =
                find_allowed_root(entry, &self.config.site.allowed_file_roots).ok_or_else(outside)?;
            let entry = clean_path(entry).ok_or_else(outside)?;

            let files = self
                .fs
                .list_files(&entry)
                .map_err(|source| ArchiveError::io(&entry, source))?;

            for file in files {
                let relative = file
                    .strip_prefix(&root)
                    .map_err(|_| ArchiveError::OutsideAllowedRoots(file.clone()))?;
                if !relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
                {
                    return Err(ArchiveError::OutsideAllowedRoots(file.clone()));
                }
                let target = working_dir.join(relative);

                self.fs
                    .copy(&file, &target)
                    .map_err(|source| ArchiveError::io(&file, source))?;
                copied += 1;
            }
        }

        Ok(copied)
    }

    /// Produces the final artifact
    ///
    /// Copies additional files, then zips the tree or copies it to the local
    /// directory depending on the delivery method. The working tree is deleted
    /// afterwards when `delete_temp_files` is set. A run where nothing was
    /// written still packages, as an empty artifact.
    ///
    /// # Returns
    ///
    /// Path of the zip file or of the local output directory
    pub fn package(&self) -> Result<PathBuf, ArchiveError> {
        let working_dir = self.working_dir();
        self.fs
            .create_dir_all(&working_dir)
            .map_err(|source| ArchiveError::io(&working_dir, source))?;

        let copied = self.copy_additional_files()?;
        if copied > 0 {
            tracing::info!("Copied {} additional files", copied);
        }

        let artifact = match self.config.output.delivery_method {
            DeliveryMethod::Zip => self.create_zip()?,
            DeliveryMethod::Local => self.copy_to_local_dir()?,
        };

        if self.config.output.delete_temp_files {
            self.delete_working_dir()?;
        }

        Ok(artifact)
    }

    /// Zips the working tree into `temp_files_dir/<archive_name>.zip`
    ///
    /// Entries are stored under a top-level `<archive_name>/` directory. The
    /// archive is streamed to disk one file at a time.
    pub fn create_zip(&self) -> Result<PathBuf, ArchiveError> {
        let working_dir = self.working_dir();
        let files = self
            .fs
            .list_files(&working_dir)
            .map_err(|source| ArchiveError::io(&working_dir, source))?;

        let zip_path = self.zip_path();
        let output = self
            .fs
            .create(&zip_path)
            .map_err(|source| ArchiveError::io(&zip_path, source))?;

        let mut zip = ZipWriter::new(output);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for file in &files {
            let Ok(relative) = file.strip_prefix(&working_dir) else {
                continue;
            };
            let contents = self
                .fs
                .read(file)
                .map_err(|source| ArchiveError::io(file, source))?;

            let entry_name = format!("{}/{}", self.archive_name, to_slash_path(relative));
            zip.start_file(entry_name, options)?;
            zip.write_all(&contents)
                .map_err(|source| ArchiveError::io(file, source))?;
        }

        let mut output = zip.finish()?;
        output
            .flush()
            .map_err(|source| ArchiveError::io(&zip_path, source))?;

        tracing::info!("Created {} ({} files)", zip_path.display(), files.len());
        Ok(zip_path)
    }

    /// Copies the working tree into the configured local directory
    pub fn copy_to_local_dir(&self) -> Result<PathBuf, ArchiveError> {
        let local_dir = self
            .config
            .output
            .local_dir
            .clone()
            .ok_or(ArchiveError::MissingLocalDir)?;

        if !self.fs.is_dir(&local_dir) {
            return Err(ArchiveError::LocalDirUnavailable(format!(
                "{} does not exist",
                local_dir.display()
            )));
        }
        if !self.fs.is_writable(&local_dir) {
            return Err(ArchiveError::LocalDirUnavailable(format!(
                "{} is not writeable",
                local_dir.display()
            )));
        }

        let working_dir = self.working_dir();
        let files = self
            .fs
            .list_files(&working_dir)
            .map_err(|source| ArchiveError::io(&working_dir, source))?;

        for file in &files {
            let Ok(relative) = file.strip_prefix(&working_dir) else {
                continue;
            };
            let target = local_dir.join(relative);
            self.fs
                .copy(file, &target)
                .map_err(|source| ArchiveError::io(&target, source))?;
        }

        tracing::info!("Copied {} files to {}", files.len(), local_dir.display());
        Ok(local_dir)
    }

    /// Removes the working tree, keeping only the artifact
    pub fn delete_working_dir(&self) -> Result<(), ArchiveError> {
        let working_dir = self.working_dir();
        if self.fs.exists(&working_dir) {
            self.fs
                .remove_dir_all(&working_dir)
                .map_err(|source| ArchiveError::io(&working_dir, source))?;
            tracing::debug!("Deleted {}", working_dir.display());
        }
        Ok(())
    }
}

/// Resolves a packaged artifact by file name within `temp_files_dir`
///
/// Names containing path separators or parent components are rejected so a
/// caller cannot reach outside the temporary directory.
pub fn artifact_path(config: &Config, filename: &str) -> Result<PathBuf, ArchiveError> {
    let name = filename.trim();
    if name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.')
    {
        return Err(ArchiveError::InvalidArtifactName(filename.to_string()));
    }

    Ok(config.output.temp_files_dir.join(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::fs::MemoryFileSystem;
    use crate::url::normalize_url;
    use std::io::{Cursor, Read};

    fn config(extra_site: &str, extra_output: &str) -> Config {
        parse_config(&format!(
            r#"
[site]
origin-url = "http://example.org"
destination-host = "static.example.com"
allowed-file-roots = ["/var/www"]
{}

[output]
database-path = "./mirror.db"
temp-files-dir = "/tmp/mirror"
{}
"#,
            extra_site, extra_output
        ))
        .unwrap()
    }

    fn fetched(content_type: &str, body: &str) -> FetchResult {
        FetchResult {
            final_url: Url::parse("http://example.org/").unwrap(),
            status_code: 200,
            content_type: Some(content_type.to_string()),
            body: body.as_bytes().to_vec(),
            headers: Vec::new(),
        }
    }

    fn creator(config: Config, fs: Arc<MemoryFileSystem>) -> ArchiveCreator {
        ArchiveCreator::new(Arc::new(config), fs, "static-mirror-1").unwrap()
    }

    #[test]
    fn test_materialize_rewrites_html() {
        let fs = Arc::new(MemoryFileSystem::new());
        let creator = creator(config("", ""), fs.clone());
        let url = Url::parse("http://example.org/about/").unwrap();

        let written = creator
            .materialize(
                &url,
                &fetched(
                    "text/html; charset=UTF-8",
                    r#"<a href="http://example.org/contact/">c</a>"#,
                ),
            )
            .unwrap();

        assert_eq!(written, "about/index.html");
        let body = fs
            .read_to_string(Path::new("/tmp/mirror/static-mirror-1/about/index.html"))
            .unwrap();
        assert_eq!(body, r#"<a href="https://static.example.com/contact/">c</a>"#);
    }

    #[test]
    fn test_materialize_relative_links() {
        let fs = Arc::new(MemoryFileSystem::new());
        let creator = creator(config(r#"link-style = "relative""#, ""), fs.clone());
        let url = Url::parse("http://example.org/css/site.css").unwrap();

        creator
            .materialize(
                &url,
                &fetched("text/css", "a { background: url(http://example.org/bg.png) }"),
            )
            .unwrap();

        let body = fs
            .read_to_string(Path::new("/tmp/mirror/static-mirror-1/css/site.css"))
            .unwrap();
        assert_eq!(body, "a { background: url(../bg.png) }");
    }

    #[test]
    fn test_materialize_binary_untouched() {
        let fs = Arc::new(MemoryFileSystem::new());
        let creator = creator(config("", ""), fs.clone());
        let url = Url::parse("http://example.org/logo.png").unwrap();
        let mut result = fetched("image/png", "");
        result.body = vec![0x89, b'P', b'N', b'G', 0xff];

        creator.materialize(&url, &result).unwrap();

        let bytes = fs
            .read(Path::new("/tmp/mirror/static-mirror-1/logo.png"))
            .unwrap();
        assert_eq!(bytes, vec![0x89, b'P', b'N', b'G', 0xff]);
    }

    #[test]
    fn test_materialize_keeps_legacy_encoding() {
        let fs = Arc::new(MemoryFileSystem::new());
        let creator = creator(config("", ""), fs.clone());
        let url = Url::parse("http://example.org/").unwrap();
        let mut result = fetched("text/html; charset=iso-8859-1", "");
        result.body = b"<p>caf\xE9</p><a href=\"http://example.org/men\xFC/\">m</a>".to_vec();

        creator.materialize(&url, &result).unwrap();

        let bytes = fs
            .read(Path::new("/tmp/mirror/static-mirror-1/index.html"))
            .unwrap();
        assert_eq!(
            bytes,
            b"<p>caf\xE9</p><a href=\"https://static.example.com/men\xFC/\">m</a>".to_vec()
        );
    }

    #[test]
    fn test_query_references_point_at_saved_files() {
        let fs = Arc::new(MemoryFileSystem::new());
        let creator = creator(config("", "[crawler]\nkeep-query-strings = true"), fs.clone());
        let page = Url::parse("http://example.org/blog/").unwrap();
        let mut result = fetched(
            "text/html",
            concat!(
                r#"<link href="/style.css?ver=2&amp;min=1">"#,
                r#"<script src="http://example.org/app.js?v=9"></script>"#,
                r#"<a href="/plain/">p</a>"#,
                r#"<img src="http://elsewhere.org/x.png?v=1">"#,
            ),
        );
        result.final_url = page.clone();

        creator.materialize(&page, &result).unwrap();

        let css = local_path_for(&normalize_url("http://example.org/style.css?ver=2&min=1", true).unwrap());
        let js = local_path_for(&normalize_url("http://example.org/app.js?v=9", true).unwrap());
        assert_ne!(to_slash_path(&css), "style.css");

        let body = fs
            .read_to_string(Path::new("/tmp/mirror/static-mirror-1/blog/index.html"))
            .unwrap();
        assert_eq!(
            body,
            format!(
                concat!(
                    r#"<link href="https://static.example.com/{}">"#,
                    r#"<script src="https://static.example.com/{}"></script>"#,
                    r#"<a href="/plain/">p</a>"#,
                    r#"<img src="http://elsewhere.org/x.png?v=1">"#,
                ),
                to_slash_path(&css),
                to_slash_path(&js)
            )
        );
    }

    #[test]
    fn test_query_references_untouched_when_queries_dropped() {
        let fs = Arc::new(MemoryFileSystem::new());
        let creator = creator(config("", ""), fs.clone());
        let html = r#"<link href="/style.css?ver=2">"#;

        creator
            .materialize(&Url::parse("http://example.org/").unwrap(), &fetched("text/html", html))
            .unwrap();

        assert_eq!(
            fs.read_to_string(Path::new("/tmp/mirror/static-mirror-1/index.html"))
                .as_deref(),
            Some(html)
        );
    }

    #[test]
    fn test_materialize_write_failure() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.set_read_only(Path::new("/tmp/mirror"));
        let creator = creator(config("", ""), fs);
        let url = Url::parse("http://example.org/").unwrap();

        let err = creator
            .materialize(&url, &fetched("text/html", "<p>hi</p>"))
            .unwrap_err();
        assert!(matches!(err, ArchiveError::Io { .. }));
    }

    #[test]
    fn test_package_zip_with_additional_files() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.write(Path::new("/var/www/robots.txt"), b"User-agent: *")
            .unwrap();
        fs.write(Path::new("/var/www/assets/a.js"), b"let a;").unwrap();

        let creator = creator(
            config(
                r#"additional-files = ["/var/www/robots.txt", "/var/www/assets"]"#,
                "",
            ),
            fs.clone(),
        );
        creator
            .materialize(
                &Url::parse("http://example.org/").unwrap(),
                &fetched("text/html", "<p>home</p>"),
            )
            .unwrap();

        let artifact = creator.package().unwrap();
        assert_eq!(artifact, PathBuf::from("/tmp/mirror/static-mirror-1.zip"));

        // Working tree removed by default
        assert!(!fs.exists(Path::new("/tmp/mirror/static-mirror-1/index.html")));

        let bytes = fs.read(&artifact).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "static-mirror-1/assets/a.js",
                "static-mirror-1/index.html",
                "static-mirror-1/robots.txt",
            ]
        );

        let mut index = String::new();
        archive
            .by_name("static-mirror-1/index.html")
            .unwrap()
            .read_to_string(&mut index)
            .unwrap();
        assert_eq!(index, "<p>home</p>");
    }

    #[test]
    fn test_package_with_nothing_fetched() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.create_dir_all(Path::new("/tmp/mirror")).unwrap();
        let creator = creator(config("", ""), fs.clone());

        let artifact = creator.package().unwrap();

        let bytes = fs.read(&artifact).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 0);
        assert!(!fs.exists(Path::new("/tmp/mirror/static-mirror-1")));
    }

    #[test]
    fn test_additional_files_cannot_leave_root() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.write(Path::new("/var/secret.txt"), b"secret").unwrap();
        fs.write(Path::new("/var/www/robots.txt"), b"User-agent: *")
            .unwrap();

        let escaping = creator(
            config(r#"additional-files = ["/var/www/../secret.txt"]"#, ""),
            fs.clone(),
        );
        let err = escaping.copy_additional_files().unwrap_err();
        assert!(matches!(err, ArchiveError::OutsideAllowedRoots(_)));
        assert!(!fs.exists(Path::new("/tmp/mirror/secret.txt")));
        assert!(!fs.exists(Path::new("/tmp/mirror/static-mirror-1/../secret.txt")));

        let dotted = creator(
            config(r#"additional-files = ["/var/www/./assets/../robots.txt"]"#, ""),
            fs.clone(),
        );
        assert_eq!(dotted.copy_additional_files().unwrap(), 1);
        assert!(fs.exists(Path::new("/tmp/mirror/static-mirror-1/robots.txt")));
    }

    #[test]
    fn test_package_local_keeps_temp_files() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.create_dir_all(Path::new("/srv/www")).unwrap();

        let creator = creator(
            config(
                "",
                r#"delivery-method = "local"
local-dir = "/srv/www"
delete-temp-files = false"#,
            ),
            fs.clone(),
        );
        creator
            .materialize(
                &Url::parse("http://example.org/about/").unwrap(),
                &fetched("text/html", "<p>about</p>"),
            )
            .unwrap();

        let artifact = creator.package().unwrap();
        assert_eq!(artifact, PathBuf::from("/srv/www"));
        assert_eq!(
            fs.read_to_string(Path::new("/srv/www/about/index.html")).as_deref(),
            Some("<p>about</p>")
        );
        assert!(fs.exists(Path::new("/tmp/mirror/static-mirror-1/about/index.html")));
    }

    #[test]
    fn test_package_local_missing_dir() {
        let fs = Arc::new(MemoryFileSystem::new());
        let creator = creator(
            config(
                "",
                r#"delivery-method = "local"
local-dir = "/srv/missing""#,
            ),
            fs,
        );

        let err = creator.package().unwrap_err();
        assert!(matches!(err, ArchiveError::LocalDirUnavailable(_)));
    }

    #[test]
    fn test_artifact_path() {
        let config = config("", "");
        assert_eq!(
            artifact_path(&config, "static-mirror-1.zip").unwrap(),
            PathBuf::from("/tmp/mirror/static-mirror-1.zip")
        );
        assert!(artifact_path(&config, "../etc/passwd").is_err());
        assert!(artifact_path(&config, "a/b.zip").is_err());
        assert!(artifact_path(&config, "").is_err());
    }
}
