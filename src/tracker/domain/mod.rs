//! Tracker-facing domain values and vocabulary translation.

mod issue;
mod vocabulary;

pub use issue::{IssueFieldUpdate, NamedField, RemoteIssue};
pub use vocabulary::{
    StatusCategory, is_completed_status, map_priority, map_status, remote_priority_name,
};
