//! Translation of tracker status and priority vocabularies.
//!
//! Every function here is total over arbitrary strings, case-insensitive
//! and side-effect free, so the diff can call them as often as it likes.

use crate::task::domain::Priority;
use serde::{Deserialize, Serialize};

/// Internal status category for tracker statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// Not started.
    Todo,
    /// Being worked on.
    InProgress,
    /// Finished, resolved or abandoned.
    Completed,
}

impl StatusCategory {
    /// Returns the canonical representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

const COMPLETED_STATUSES: &[&str] = &[
    "done",
    "closed",
    "resolved",
    "complete",
    "completed",
    "cancelled",
    "canceled",
    "won't do",
    "wont do",
    "won't fix",
    "wont fix",
    "fixed",
    "released",
    "shipped",
];

const IN_PROGRESS_STATUSES: &[&str] = &[
    "in progress",
    "in review",
    "code review",
    "review",
    "in development",
    "doing",
    "started",
    "testing",
    "qa",
    "in qa",
    "blocked",
];

/// Lowercases, trims, and folds `_`/`-` and runs of whitespace to one space.
fn normalize(raw: &str) -> String {
    raw.split(|ch: char| ch.is_whitespace() || ch == '_' || ch == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Maps a tracker status name to its category. Unknown names map to
/// [`StatusCategory::Todo`].
#[must_use]
pub fn map_status(remote_status: &str) -> StatusCategory {
    let normalized = normalize(remote_status);
    if COMPLETED_STATUSES.contains(&normalized.as_str()) {
        StatusCategory::Completed
    } else if IN_PROGRESS_STATUSES.contains(&normalized.as_str()) {
        StatusCategory::InProgress
    } else {
        StatusCategory::Todo
    }
}

/// Returns whether a tracker status counts as completed.
///
/// Always agrees with [`map_status`].
#[must_use]
pub fn is_completed_status(remote_status: &str) -> bool {
    map_status(remote_status) == StatusCategory::Completed
}

/// Maps a tracker priority name to the internal priority. Unknown names
/// map to [`Priority::Medium`].
#[must_use]
pub fn map_priority(remote_priority: &str) -> Priority {
    match normalize(remote_priority).as_str() {
        "highest" | "blocker" | "critical" | "urgent" | "p0" => Priority::Urgent,
        "high" | "major" | "p1" => Priority::High,
        "low" | "lowest" | "minor" | "trivial" | "p3" | "p4" => Priority::Low,
        _ => Priority::Medium,
    }
}

/// Returns the tracker priority name sent on write-back.
#[must_use]
pub const fn remote_priority_name(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "Highest",
        Priority::High => "High",
        Priority::Medium => "Medium",
        Priority::Low => "Low",
    }
}
