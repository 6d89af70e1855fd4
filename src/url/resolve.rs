use crate::url::normalize::normalize_parsed;
use url::Url;

/// Resolves a raw reference found in a page into a crawlable absolute URL
///
/// Root-relative references (`/x`) resolve against the origin; dot-relative,
/// bare relative, protocol-relative and absolute references resolve against
/// the URL of the page they were found on. The result is normalized (fragment
/// removed, query removed unless `keep_query`).
///
/// # Arguments
///
/// * `raw` - The reference as written in the document
/// * `page_url` - URL of the page the reference was found on
/// * `origin` - The configured origin
/// * `keep_query` - Whether query strings are part of the crawl identity
///
/// # Returns
///
/// * `Some(Url)` - The absolute http(s) URL
/// * `None` - For blank references, fragment-only references, references
///   that cannot be parsed and non-fetchable schemes
///
/// # Examples
///
/// ```
/// use url::Url;
/// use static_mirror::url::resolve_reference;
///
/// let origin = Url::parse("http://example.org/").unwrap();
/// let page = Url::parse("http://example.org/blog/post").unwrap();
/// let url = resolve_reference("../four.htm", &page, &origin, false).unwrap();
/// assert_eq!(url.as_str(), "http://example.org/four.htm");
/// ```
pub fn resolve_reference(raw: &str, page_url: &Url, origin: &Url, keep_query: bool) -> Option<Url> {
    let reference = raw.trim();
    if reference.is_empty() || reference.starts_with('#') {
        return None;
    }

    let joined = if reference.starts_with('/') && !reference.starts_with("//") {
        origin.join(reference)
    } else {
        page_url.join(reference)
    };

    let url = joined.ok()?;
    normalize_parsed(url, keep_query).ok()
}
