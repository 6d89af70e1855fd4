//! URL handling module for Static-Mirror
//!
//! This module provides URL normalization, reference resolution against the
//! page and origin, and the origin locality check.

mod domain;
mod normalize;
mod resolve;

pub use domain::{extract_domain, is_local};
pub use normalize::{normalize_parsed, normalize_url};
pub use resolve::resolve_reference;
