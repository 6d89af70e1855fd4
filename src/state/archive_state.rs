//! Run-level state: the archive state machine and its persisted record

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Phase of an archive run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveState {
    #[default]
    NotStarted,
    Fetching,
    Packaging,
    Done,
    Cancelled,
    Error,
}

impl ArchiveState {
    /// Returns true for DONE, CANCELLED and ERROR
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Error)
    }

    /// Returns true while `continue` has work to do
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Fetching | Self::Packaging)
    }

    /// Converts the state to its database (and display) name
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::Fetching => "FETCHING",
            Self::Packaging => "PACKAGING",
            Self::Done => "DONE",
            Self::Cancelled => "CANCELLED",
            Self::Error => "ERROR",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "NOT_STARTED" => Some(Self::NotStarted),
            "FETCHING" => Some(Self::Fetching),
            "PACKAGING" => Some(Self::Packaging),
            "DONE" => Some(Self::Done),
            "CANCELLED" => Some(Self::Cancelled),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn all_states() -> Vec<Self> {
        vec![
            Self::NotStarted,
            Self::Fetching,
            Self::Packaging,
            Self::Done,
            Self::Cancelled,
            Self::Error,
        ]
    }
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A control action sent to the archive manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Continue,
    Cancel,
}

impl Action {
    /// Parses `start`, `continue` or `cancel` (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "continue" => Some(Self::Continue),
            "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Continue => "continue",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted record of the current run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RunState {
    /// Current phase
    pub state: ArchiveState,

    /// Pages checked so far
    pub processed: u64,

    /// Pages still unchecked after the last batch
    pub remaining: u64,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Name of the working directory and base name of the zip
    pub archive_name: Option<String>,

    /// SHA-256 of the configuration the run was started with
    pub config_hash: Option<String>,

    /// Path of the packaged zip or local directory once DONE
    pub artifact_path: Option<String>,

    /// Cause of the failure when in ERROR
    pub error_message: Option<String>,
}

impl RunState {
    /// A fresh record for a run started now
    pub fn started(archive_name: String, config_hash: Option<String>) -> Self {
        Self {
            state: ArchiveState::Fetching,
            started_at: Some(Utc::now()),
            archive_name: Some(archive_name),
            config_hash,
            ..Self::default()
        }
    }

    /// Moves to a terminal state, stamping the finish time
    pub fn finish(&mut self, state: ArchiveState) {
        self.state = state;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!ArchiveState::NotStarted.is_terminal());
        assert!(!ArchiveState::Fetching.is_terminal());
        assert!(!ArchiveState::Packaging.is_terminal());
        assert!(ArchiveState::Done.is_terminal());
        assert!(ArchiveState::Cancelled.is_terminal());
        assert!(ArchiveState::Error.is_terminal());
    }

    #[test]
    fn test_is_active() {
        assert!(ArchiveState::Fetching.is_active());
        assert!(ArchiveState::Packaging.is_active());
        assert!(!ArchiveState::NotStarted.is_active());
        assert!(!ArchiveState::Done.is_active());
    }

    #[test]
    fn test_roundtrip_db_string() {
        for state in ArchiveState::all_states() {
            let parsed = ArchiveState::from_db_string(state.to_db_string());
            assert_eq!(Some(state), parsed, "Failed roundtrip for {:?}", state);
        }
        assert_eq!(ArchiveState::from_db_string("fetching"), None);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(Action::parse("start"), Some(Action::Start));
        assert_eq!(Action::parse(" Continue "), Some(Action::Continue));
        assert_eq!(Action::parse("CANCEL"), Some(Action::Cancel));
        assert_eq!(Action::parse("pause"), None);
        assert_eq!(Action::Continue.to_string(), "continue");
    }

    #[test]
    fn test_run_state_lifecycle() {
        let mut run = RunState::started("static-mirror-1".to_string(), None);
        assert_eq!(run.state, ArchiveState::Fetching);
        assert!(run.started_at.is_some());
        assert!(run.finished_at.is_none());

        run.finish(ArchiveState::Cancelled);
        assert_eq!(run.state, ArchiveState::Cancelled);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_serialized_state_name() {
        let json = serde_json::to_string(&ArchiveState::NotStarted).unwrap();
        assert_eq!(json, "\"NOT_STARTED\"");
    }
}
