//! Rewriting of origin references in HTML and CSS bodies
//!
//! Bodies are rewritten as raw bytes so pages in legacy encodings such as
//! ISO-8859-1 reach the static copy unchanged apart from their links.

use crate::archive::paths::path_to_root;
use regex::bytes::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;
use url::Url;

/// Where rewritten links should point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// Replace the origin with another `scheme://host`
    Absolute(String),

    /// Replace the origin with a path relative to the file being written
    Relative,
}

/// Rewrites every reference to one origin
///
/// Handles `http://host`, `https://host`, protocol-relative `//host` and the
/// JSON-escaped `http:\/\/host` form. An explicit port is accepted when it is
/// the origin's own, including the scheme default (`http://host:80`). A host
/// is only matched whole, so `example.org.evil.com` and `example.org:8080`
/// are left alone.
#[derive(Debug, Clone)]
pub struct LinkRewriter {
    pattern: Regex,
    origin_scheme: String,
    origin_port: Option<u16>,
    target: LinkTarget,
}

impl LinkRewriter {
    /// Builds a rewriter for `origin`
    pub fn new(origin: &Url, target: LinkTarget) -> Result<Self, regex::Error> {
        let host = origin.host_str().unwrap_or_default();

        let pattern = Regex::new(&format!(
            r"(?i)(https?:)?(\\?/)(?:\\?/){}(?::([0-9]{{1,5}}))?((?-u:[^A-Za-z0-9.\-_:])|$)",
            regex::escape(host),
        ))?;

        Ok(Self {
            pattern,
            origin_scheme: origin.scheme().to_string(),
            origin_port: origin.port(),
            target,
        })
    }

    /// Rewrites `body`, which will be written at `file` in the working tree
    pub fn rewrite(&self, body: &[u8], file: &Path) -> Vec<u8> {
        let root = self.root_for(file);

        self.pattern
            .replace_all(body, |caps: &Captures<'_>| {
                if !self.is_origin_port(caps) {
                    return caps[0].to_vec();
                }

                let escaped = &caps[2] == b"\\/";
                let terminator = caps.get(4).map_or(&[][..], |m| m.as_bytes());

                let mut replaced = if escaped {
                    root.replace('/', "\\/").into_bytes()
                } else {
                    root.clone().into_bytes()
                };
                replaced.extend_from_slice(terminator);
                replaced
            })
            .into_owned()
    }

    /// Replaces whole references with links to files in the tree
    ///
    /// Each `(reference, path)` pair swaps the reference, as written in the
    /// body, for `path` under the rewrite target. A reference only matches
    /// when it stands alone between quotes, parentheses, whitespace or `=`.
    ///
    /// # Arguments
    ///
    /// * `body` - The body to rewrite
    /// * `file` - Where the body will be written in the working tree
    /// * `links` - Raw references and the `/`-separated tree paths they map to
    pub fn rewrite_references(
        &self,
        body: &[u8],
        file: &Path,
        links: &[(String, String)],
    ) -> Result<Vec<u8>, regex::Error> {
        if links.is_empty() {
            return Ok(body.to_vec());
        }

        let root = self.root_for(file);
        let replacements: HashMap<&[u8], String> = links
            .iter()
            .map(|(raw, path)| (raw.as_bytes(), format!("{}/{}", root, path)))
            .collect();

        let mut references: Vec<&str> = links.iter().map(|(raw, _)| raw.as_str()).collect();
        references.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        references.dedup();

        let alternatives = references
            .iter()
            .map(|raw| regex::escape(raw))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(
            r#"(^|[\s"'(=])({})([\s"')>]|$)"#,
            alternatives
        ))?;

        let rewritten = pattern.replace_all(body, |caps: &Captures<'_>| {
            let mut replaced = caps[1].to_vec();
            match replacements.get(&caps[2]) {
                Some(link) => replaced.extend_from_slice(link.as_bytes()),
                None => replaced.extend_from_slice(&caps[2]),
            }
            replaced.extend_from_slice(&caps[3]);
            replaced
        });

        Ok(rewritten.into_owned())
    }

    fn root_for(&self, file: &Path) -> String {
        match &self.target {
            LinkTarget::Absolute(destination) => destination.clone(),
            LinkTarget::Relative => path_to_root(file),
        }
    }

    /// True when the matched port, after dropping a scheme default, is the
    /// origin's port
    fn is_origin_port(&self, caps: &Captures<'_>) -> bool {
        let Some(port) = caps.get(3) else {
            return self.origin_port.is_none();
        };
        let Some(port) = std::str::from_utf8(port.as_bytes())
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
        else {
            return false;
        };

        let scheme = caps
            .get(1)
            .map(|m| String::from_utf8_lossy(m.as_bytes()).to_ascii_lowercase())
            .map(|s| s.trim_end_matches(':').to_string())
            .unwrap_or_else(|| self.origin_scheme.clone());
        let default_port = match scheme.as_str() {
            "https" => 443,
            _ => 80,
        };

        let port = (port != default_port).then_some(port);
        port == self.origin_port
    }
}
