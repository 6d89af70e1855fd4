//! URL discovery in fetched bodies
//!
//! An extractor is chosen from the response content type. It yields the raw
//! references as written in the document; [`extract_urls`] then resolves them
//! against the page and origin and splits them into local and external sets.

mod css;
mod html;

pub use css::{css_references, CssExtractor};
pub use html::{html_references, HtmlExtractor};

use crate::url::{is_local, resolve_reference};
use std::collections::HashSet;
use url::Url;

/// The kinds of body the mirror knows how to scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Css,
}

impl ContentKind {
    /// Classifies a `Content-Type` header value, ignoring parameters
    ///
    /// Returns `None` for content the mirror copies verbatim (images, fonts,
    /// scripts, ...).
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "text/css" => Some(Self::Css),
            _ => None,
        }
    }

    /// Parses an explicit override such as `"html"` or `"css"`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Some(Self::Html),
            "css" => Some(Self::Css),
            other => Self::from_content_type(other),
        }
    }
}

/// Produces the raw references contained in a body
pub trait UrlExtractor: Send + Sync {
    fn references(&self, body: &str) -> Vec<String>;
}

/// Builds the extractor for a content kind
pub fn extractor_for(kind: ContentKind) -> Box<dyn UrlExtractor> {
    match kind {
        ContentKind::Html => Box::new(HtmlExtractor),
        ContentKind::Css => Box::new(CssExtractor),
    }
}

/// Discovered URLs of one body, deduplicated, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    /// URLs on the origin, to be added to the frontier
    pub local: Vec<Url>,

    /// URLs on other hosts; reported but never fetched
    pub external: Vec<Url>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.local.is_empty() && self.external.is_empty()
    }
}

/// Extracts and resolves every reference in `body`
///
/// # Arguments
///
/// * `kind` - How to scan the body
/// * `body` - The fetched document
/// * `page_url` - Final URL of the fetched document
/// * `origin` - The configured origin
/// * `keep_query` - Whether query strings are part of a URL's identity
pub fn extract_urls(
    kind: ContentKind,
    body: &str,
    page_url: &Url,
    origin: &Url,
    keep_query: bool,
) -> ExtractionResult {
    let mut seen = HashSet::new();
    let mut result = ExtractionResult::default();

    for raw in extractor_for(kind).references(body) {
        let Some(url) = resolve_reference(&raw, page_url, origin, keep_query) else {
            continue;
        };

        if !seen.insert(url.clone()) {
            continue;
        }

        if is_local(&url, origin) {
            result.local.push(url);
        } else {
            result.external.push(url);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "http://example.org";

    fn extract(kind: ContentKind, body: &str) -> Vec<String> {
        let origin = Url::parse("http://example.org/").unwrap();
        let page = Url::parse("http://example.org/blog/my-first-blog-post").unwrap();
        extract_urls(kind, body, &page, &origin, false)
            .local
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn first_html(body: &str) -> Option<String> {
        extract(ContentKind::Html, body).into_iter().next()
    }

    fn first_css(body: &str) -> Option<String> {
        extract(ContentKind::Css, body).into_iter().next()
    }

    fn at(path: &str) -> Option<String> {
        Some(format!("{}{}", DOMAIN, path))
    }

    #[test]
    fn test_content_kind_from_header() {
        assert_eq!(
            ContentKind::from_content_type("text/html; charset=UTF-8"),
            Some(ContentKind::Html)
        );
        assert_eq!(
            ContentKind::from_content_type("application/xhtml+xml"),
            Some(ContentKind::Html)
        );
        assert_eq!(ContentKind::from_content_type("TEXT/CSS"), Some(ContentKind::Css));
        assert_eq!(ContentKind::from_content_type("image/png"), None);
        assert_eq!(ContentKind::parse("css"), Some(ContentKind::Css));
    }

    #[test]
    fn test_html_links() {
        let cases = [
            ("<a href='/one.htm'>one</a>", at("/one.htm")),
            ("<a href='    /two.htm  '>two</a>", at("/two.htm")),
            ("<a href=three.htm>three</a>", at("/blog/three.htm")),
            (r#"<a href="../four.htm">four</a>"#, at("/four.htm")),
            ("<a href=./five.htm>five</a>", at("/blog/five.htm")),
            ("<a href = six.htm>six</a>", at("/blog/six.htm")),
            ("<a href='file seven.pdf'>seven</a>", at("/blog/file%20seven.pdf")),
            ("<a href=nine.htm test=test>nine</a>", at("/blog/nine.htm")),
            ("<a href='/path/ten.htm'>ten</a>", at("/path/ten.htm")),
            ("<a href='/11.htm?test=true'>11</a>", at("/11.htm")),
            ("<a href='/12.htm#test'>12</a>", at("/12.htm")),
            ("<A HRef='/THIRTEEN.htm'>13</a>", at("/THIRTEEN.htm")),
            ("<a href='http://example.org/14'>14</a>", at("/14")),
            ("<a href='http://example.org#section15'>15</a>", at("/")),
            ("<a href='http://example.org/test#section16'>16</a>", at("/test")),
            ("<a href='http://example.org/test/17.htm'>17</a>", at("/test/17.htm")),
            ("<a href='http://www.external.com/18.htm'>18</a>", None),
        ];

        for (body, expected) in cases {
            assert_eq!(first_html(body), expected, "body: {}", body);
        }
    }

    #[test]
    fn test_other_html_elements() {
        let cases = [
            (
                "<link rel='stylesheet' id='test-css'  href='/test.css' type='text/css' media='all' />",
                at("/test.css"),
            ),
            (
                "<link href='//fonts.googleapis.com/css?family=Judson:400,400italic,700' rel='stylesheet' type='text/css'>",
                None,
            ),
            (r#"<applet codebase="/classes"></applet>"#, at("/classes")),
            (
                r#"<area shape="rect" coords="0,0,10,10" href="sun.htm">"#,
                at("/blog/sun.htm"),
            ),
            (r#"<ins cite="why.htm">Cited text.</ins>"#, at("/blog/why.htm")),
            (r#"<!-- <ins cite="why.htm">Cited text.</ins> -->"#, None),
        ];

        for (body, expected) in cases {
            assert_eq!(first_html(body), expected, "body: {}", body);
        }
    }

    #[test]
    fn test_multiple_attributes() {
        assert_eq!(
            extract(
                ContentKind::Html,
                r#"<iframe src="/default.asp" longdesc="w3s.txt"></iframe>"#
            ),
            vec![
                format!("{}/default.asp", DOMAIN),
                format!("{}/blog/w3s.txt", DOMAIN)
            ]
        );
        assert_eq!(
            extract(
                ContentKind::Html,
                r#"<object classid="clsid:D27CDB6E-AE6D-11cf-96B8-444553540000" codebase="/swflash.cab#version=9,0,28,0">"#
            ),
            vec![format!("{}/swflash.cab", DOMAIN)]
        );
        assert_eq!(
            extract(
                ContentKind::Html,
                r#"<OBJECT CLASSID="/yahtzee.py" CODETYPE="application/x-python" TITLE="My Yahtzee Game"></OBJECT>"#
            ),
            vec![format!("{}/yahtzee.py", DOMAIN)]
        );
    }

    #[test]
    fn test_style_attributes() {
        let cases = [
            (
                r#"<body style='background: #00ff00 url("/smiley.gif") no-repeat fixed center;'></body>"#,
                at("/smiley.gif"),
            ),
            (
                r#"<div style='background-image: url("/one.png")'></div>"#,
                at("/one.png"),
            ),
            ("<div STYLE='background-IMAGE: url(/two.png)'></div>", at("/two.png")),
            (
                r#"<div style="background-image: url('/three.png')"></div>"#,
                at("/three.png"),
            ),
        ];

        for (body, expected) in cases {
            assert_eq!(first_html(body), expected, "body: {}", body);
        }
    }

    #[test]
    fn test_style_blocks() {
        assert_eq!(
            first_html(r#"<STYLE> @import url("/import.css") print; </STYLE>"#),
            at("/import.css")
        );
        assert_eq!(
            first_html("<style> div { background-image: url(/image-one.png); } </style>"),
            at("/image-one.png")
        );
    }

    #[test]
    fn test_css_files() {
        let cases = [
            (r#"@import url("./one.css") print;"#, at("/blog/one.css")),
            (r#"@import url("../two.css") projection, tv;"#, at("/two.css")),
            ("@import 'three.css';", at("/blog/three.css")),
            (r#"@import "./four.css" print;"#, at("/blog/four.css")),
            (r#"@import url("chrome://five/");"#, None),
            (
                "@import url('six.css') screen and (orientation:landscape);",
                at("/blog/six.css"),
            ),
            (".seven { background-image: url(seven.png); }", at("/blog/seven.png")),
            (r#".eight { background-image: url("eight.png"); }"#, at("/blog/eight.png")),
            (".nine { background-image: url(  'nine.png'  ); }", at("/blog/nine.png")),
        ];

        for (body, expected) in cases {
            assert_eq!(first_css(body), expected, "body: {}", body);
        }
    }

    #[test]
    fn test_deduplicated_and_partitioned() {
        let origin = Url::parse("http://example.org/").unwrap();
        let page = Url::parse("http://example.org/").unwrap();
        let body = r#"
            <a href="/a.htm">a</a>
            <a href="/a.htm#again">a</a>
            <a href="http://example.org/a.htm?x=1">a</a>
            <a href="http://external.example/18.htm">ext</a>
            <a href="mailto:me@example.org">mail</a>
        "#;

        let result = extract_urls(ContentKind::Html, body, &page, &origin, false);
        assert_eq!(result.local.len(), 1);
        assert_eq!(result.local[0].as_str(), "http://example.org/a.htm");
        assert_eq!(result.external.len(), 1);
        assert_eq!(result.external[0].as_str(), "http://external.example/18.htm");

        let again = extract_urls(ContentKind::Html, body, &page, &origin, false);
        assert_eq!(result, again);
    }
}
