/// Page status definitions for tracking crawl progress
///
/// A page is discovered unchecked and is checked exactly once per run.
use serde::Serialize;
use std::fmt;

/// Represents the crawl status of a page in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Page has been discovered but not yet fetched
    Unchecked,

    /// Page was fetched and written to the working tree
    CheckedSuccess,

    /// Page fetch failed (network error, timeout, non-2xx status)
    CheckedError,
}

impl PageStatus {
    /// Returns true once the page has been fetched, whatever the outcome
    pub fn is_checked(&self) -> bool {
        !matches!(self, Self::Unchecked)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::CheckedSuccess)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::CheckedError)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Unchecked => "unchecked",
            Self::CheckedSuccess => "checked_success",
            Self::CheckedError => "checked_error",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "unchecked" => Some(Self::Unchecked),
            "checked_success" => Some(Self::CheckedSuccess),
            "checked_error" => Some(Self::CheckedError),
            _ => None,
        }
    }

    /// Returns all possible statuses
    pub fn all_statuses() -> Vec<Self> {
        vec![Self::Unchecked, Self::CheckedSuccess, Self::CheckedError]
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
