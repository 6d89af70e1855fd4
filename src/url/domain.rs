use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use static_mirror::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.org/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.org".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true when `url` belongs to the mirrored origin
///
/// Host and explicit port must match. The scheme is ignored so an origin
/// reachable over both http and https is treated as one site.
///
/// # Arguments
///
/// * `url` - The candidate URL
/// * `origin` - The configured origin
///
/// # Examples
///
/// ```
/// use url::Url;
/// use static_mirror::url::is_local;
///
/// let origin = Url::parse("http://example.org/").unwrap();
/// assert!(is_local(&Url::parse("https://Example.org/a.css").unwrap(), &origin));
/// assert!(!is_local(&Url::parse("http://example.org:8080/").unwrap(), &origin));
/// assert!(!is_local(&Url::parse("http://www.external.com/").unwrap(), &origin));
/// ```
pub fn is_local(url: &Url, origin: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    match (extract_domain(url), extract_domain(origin)) {
        (Some(host), Some(origin_host)) => host == origin_host && url.port() == origin.port(),
        _ => false,
    }
}
