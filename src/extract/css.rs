//! CSS reference scanner
//!
//! Finds `url(...)` references (bare, single- or double-quoted, with any
//! amount of whitespace inside the parentheses) and string `@import`s.

use crate::extract::UrlExtractor;
use regex::Regex;
use std::sync::LazyLock;

static URL_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]*))\s*\)"#)
        .expect("hardcoded regex pattern is valid")
});

static IMPORT_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)@import\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("hardcoded regex pattern is valid")
});

/// Extracts references from stylesheets
#[derive(Debug, Clone, Copy, Default)]
pub struct CssExtractor;

impl UrlExtractor for CssExtractor {
    fn references(&self, body: &str) -> Vec<String> {
        css_references(body)
    }
}

/// Returns raw references in the order they appear in `css`
pub fn css_references(css: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for re in [&*URL_FUNCTION, &*IMPORT_STRING] {
        for caps in re.captures_iter(css) {
            let value = caps
                .iter()
                .skip(1)
                .flatten()
                .next()
                .map(|m| m.as_str().trim())
                .unwrap_or_default();

            if !value.is_empty() {
                let start = caps.get(0).map_or(0, |m| m.start());
                found.push((start, value.to_string()));
            }
        }
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, value)| value).collect()
}
