//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageStatus`: crawl status of one page in the frontier
//! - `ArchiveState`: phase of the run state machine
//! - `Action`: control actions accepted by the archive manager
//! - `RunState`: the persisted record of the current run

mod archive_state;
mod page_state;

// Re-export main types
pub use archive_state::{Action, ArchiveState, RunState};
pub use page_state::PageStatus;
