//! Mapping of page URLs onto files in the working tree

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

/// File written for directory-like URLs
pub const INDEX_FILE: &str = "index.html";

/// Maps a page URL onto a path relative to the working tree
///
/// - `/` and paths ending in `/` map to `<dir>/index.html`
/// - extensionless paths (`/about`) map to `about/index.html`
/// - a query string appends the first 8 hex digits of its SHA-256 to the
///   file stem, so `/file.css?x=1` and `/file.css` never collide
/// - percent-encoded segments are decoded; `.` and `..` segments are dropped
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use url::Url;
/// use static_mirror::archive::local_path_for;
///
/// let url = Url::parse("http://example.org/about/").unwrap();
/// assert_eq!(local_path_for(&url), PathBuf::from("about/index.html"));
/// ```
pub fn local_path_for(url: &Url) -> PathBuf {
    let raw_path = url.path();
    let mut segments: Vec<String> = raw_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .collect();

    let is_directory = raw_path.ends_with('/')
        || segments
            .last()
            .map_or(true, |last| Path::new(last).extension().is_none());

    if is_directory {
        segments.push(INDEX_FILE.to_string());
    }

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        if let Some(last) = segments.last_mut() {
            *last = with_query_suffix(last, query);
        }
    }

    segments.iter().collect()
}

/// Number of directories between the working tree root and `file`
pub fn depth_of(file: &Path) -> usize {
    file.components().count().saturating_sub(1)
}

/// Relative prefix leading from `file` back to the tree root, without a
/// trailing slash (`..`, `../..`, or `.` at the root)
pub fn path_to_root(file: &Path) -> String {
    match depth_of(file) {
        0 => ".".to_string(),
        depth => vec![".."; depth].join("/"),
    }
}

/// Converts a relative path to the `/`-separated form used in links and zips
pub fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn decode_segment(segment: &str) -> String {
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    // A decoded separator must not create new directories
    decoded.replace(['/', '\\'], "-")
}

fn with_query_suffix(file_name: &str, query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    let short = &hex::encode(digest)[..8];

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    match path.extension() {
        Some(ext) => format!("{}-{}.{}", stem, short, ext.to_string_lossy()),
        None => format!("{}-{}", stem, short),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(url: &str) -> PathBuf {
        local_path_for(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_root_maps_to_index() {
        assert_eq!(map("http://example.org/"), PathBuf::from("index.html"));
    }

    #[test]
    fn test_trailing_slash_maps_to_index() {
        assert_eq!(map("http://example.org/about/"), PathBuf::from("about/index.html"));
    }

    #[test]
    fn test_extensionless_maps_to_index() {
        assert_eq!(
            map("http://example.org/blog/my-first-blog-post"),
            PathBuf::from("blog/my-first-blog-post/index.html")
        );
    }

    #[test]
    fn test_file_with_extension() {
        assert_eq!(
            map("http://example.org/wp-content/style.css"),
            PathBuf::from("wp-content/style.css")
        );
    }

    #[test]
    fn test_query_string_is_distinct() {
        let plain = map("http://example.org/file.css");
        let with_query = map("http://example.org/file.css?x=1");
        let other_query = map("http://example.org/file.css?x=2");

        assert_ne!(plain, with_query);
        assert_ne!(with_query, other_query);
        assert_eq!(with_query.extension().unwrap(), "css");
        assert!(with_query
            .to_string_lossy()
            .starts_with("file-"));
    }

    #[test]
    fn test_query_on_directory() {
        let path = map("http://example.org/list/?page=2");
        assert!(path.starts_with("list"));
        assert_ne!(path, PathBuf::from("list/index.html"));
        assert_eq!(path.extension().unwrap(), "html");
    }

    #[test]
    fn test_percent_decoding() {
        assert_eq!(
            map("http://example.org/blog/file%20seven.pdf"),
            PathBuf::from("blog/file seven.pdf")
        );
    }

    #[test]
    fn test_encoded_separator_stays_in_segment() {
        assert_eq!(
            map("http://example.org/a%2Fb.txt"),
            PathBuf::from("a-b.txt")
        );
    }

    #[test]
    fn test_path_to_root() {
        assert_eq!(path_to_root(Path::new("index.html")), ".");
        assert_eq!(path_to_root(Path::new("about/index.html")), "..");
        assert_eq!(path_to_root(Path::new("a/b/c.css")), "../..");
    }

    #[test]
    fn test_to_slash_path() {
        assert_eq!(to_slash_path(Path::new("a/b/index.html")), "a/b/index.html");
    }
}
