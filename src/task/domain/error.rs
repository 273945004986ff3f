//! Error types for task domain validation and parsing.

use super::{TaskId, TrackerSource};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task title is empty after trimming.
    #[error("task title must not be empty")]
    EmptyTitle,

    /// A platform handle is empty after trimming.
    #[error("platform handle must not be empty")]
    EmptyHandle,

    /// The tracker source value is unsupported.
    #[error("unsupported tracker source: {0}")]
    InvalidTrackerSource(String),

    /// The external identifier does not match the source's id format.
    #[error("invalid {tracker} issue id '{value}'")]
    InvalidExternalId {
        /// Tracker the identifier claims to belong to.
        tracker: TrackerSource,
        /// Rejected raw identifier.
        value: String,
    },

    /// The task is tombstoned and can no longer be edited.
    #[error("task {0} is tombstoned")]
    Tombstoned(TaskId),

    /// The operation requires an external tracker link.
    #[error("task {0} is not linked to an external tracker")]
    NotLinked(TaskId),
}

/// Error returned while parsing task enumerations from persistence or
/// configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct ParseTaskValueError {
    /// Name of the enumeration being parsed.
    pub kind: &'static str,
    /// Rejected raw value.
    pub value: String,
}

impl ParseTaskValueError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}
