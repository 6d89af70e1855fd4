//! HTML reference scanner
//!
//! Built on `scraper`, so attribute case, quoting and whitespace are already
//! normalized and comment contents never reach us.

use crate::extract::css::css_references;
use crate::extract::UrlExtractor;
use scraper::{Html, Selector};

/// Attributes that always hold a single resource reference
const URL_ATTRIBUTES: &[&str] = &["href", "src", "poster", "cite", "longdesc"];

/// Attributes that hold a reference only when the value looks like one
const MAYBE_URL_ATTRIBUTES: &[&str] = &["codebase", "classid"];

/// Extracts references from HTML documents, including inline CSS
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl UrlExtractor for HtmlExtractor {
    fn references(&self, body: &str) -> Vec<String> {
        html_references(body)
    }
}

/// Returns raw references in document order
///
/// # Extraction Rules
///
/// - `href`, `src`, `poster`, `cite` and `longdesc` on any element
/// - `codebase` and `classid` when the value is not an opaque identifier
///   such as `clsid:...`
/// - `url(...)` and `@import` inside `style` attributes and `<style>` blocks
pub fn html_references(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut references = Vec::new();

    let Ok(all) = Selector::parse("*") else {
        return references;
    };

    for element in document.select(&all) {
        let value = element.value();

        for name in URL_ATTRIBUTES {
            if let Some(attr) = value.attr(name) {
                references.push(attr.to_string());
            }
        }

        for name in MAYBE_URL_ATTRIBUTES {
            if let Some(attr) = value.attr(name) {
                if looks_like_url(attr) {
                    references.push(attr.to_string());
                }
            }
        }

        if let Some(style) = value.attr("style") {
            references.extend(css_references(style));
        }

        if value.name() == "style" {
            let css = element.text().collect::<String>();
            references.extend(css_references(&css));
        }
    }

    references
}

/// Returns false for values carrying a non-http scheme like `clsid:` or `java:`
fn looks_like_url(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }

    match value.split_once(':') {
        None => true,
        Some((scheme, _)) => {
            let scheme = scheme.to_ascii_lowercase();
            scheme == "http" || scheme == "https" || scheme.contains('/')
        }
    }
}
