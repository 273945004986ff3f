//! What a reconciliation pass covers.

use crate::task::domain::{PlatformHandle, Task, UserId};
use std::fmt;

/// A remote result set plus the local user who owns tasks created from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Issues assigned to one tracker account.
    AssignedTo {
        /// Owner of tasks first created by the scope.
        owner: UserId,
        /// Tracker account handle of the assignee.
        assignee: PlatformHandle,
    },
    /// Issues in a set of tracker projects.
    Projects {
        /// Owner of tasks first created by the scope.
        owner: UserId,
        /// Project keys, sorted and deduplicated.
        projects: Vec<String>,
    },
}

impl SyncScope {
    /// Creates a scope over issues assigned to `assignee`.
    #[must_use]
    pub const fn assigned_to(owner: UserId, assignee: PlatformHandle) -> Self {
        Self::AssignedTo { owner, assignee }
    }

    /// Creates a scope over issues in `projects`. Blank keys are dropped.
    #[must_use]
    pub fn projects<I, P>(owner: UserId, projects: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let mut keys: Vec<String> = projects
            .into_iter()
            .map(|project| project.as_ref().trim().to_owned())
            .filter(|project| !project.is_empty())
            .collect();
        keys.sort();
        keys.dedup();
        Self::Projects {
            owner,
            projects: keys,
        }
    }

    /// Returns the local owner of tasks created by this scope.
    #[must_use]
    pub const fn owner(&self) -> UserId {
        match self {
            Self::AssignedTo { owner, .. } | Self::Projects { owner, .. } => *owner,
        }
    }

    /// Returns the tracker assignee the scope selects on, if any.
    #[must_use]
    pub const fn assignee(&self) -> Option<&PlatformHandle> {
        match self {
            Self::AssignedTo { assignee, .. } => Some(assignee),
            Self::Projects { .. } => None,
        }
    }

    /// Renders the tracker query for this scope, newest first.
    #[must_use]
    pub fn filter_expression(&self) -> String {
        match self {
            Self::AssignedTo { assignee, .. } => {
                format!(
                    "assignee = {} ORDER BY updated DESC",
                    quote(assignee.as_str())
                )
            }
            Self::Projects { projects, .. } => {
                let list = projects
                    .iter()
                    .map(|project| quote(project))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("project in ({list}) ORDER BY updated DESC")
            }
        }
    }

    /// Returns a stable key identifying this scope in the scheduler.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Returns whether `task` was last observed inside this scope.
    ///
    /// Coverage follows what the filter selects on, not who owns the task:
    /// a task stays covered after another owner's scope refreshed it, so the
    /// scope that last saw the issue tombstones it once it disappears.
    #[must_use]
    pub fn covers(&self, task: &Task) -> bool {
        match self {
            Self::AssignedTo { assignee, .. } => {
                task.metadata().assignment.assignee.as_ref() == Some(assignee)
            }
            Self::Projects { projects, .. } => task.external().is_some_and(|link| {
                projects
                    .iter()
                    .any(|project| key_in_project(&link.key, project))
            }),
        }
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AssignedTo { owner, assignee } => write!(f, "{owner}/assignee:{assignee}"),
            Self::Projects { owner, projects } => {
                write!(f, "{owner}/projects:{}", projects.join(","))
            }
        }
    }
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Matches `PROJ-12` (Jira, Linear) and `owner/repo#12` (GitHub) style keys.
fn key_in_project(key: &str, project: &str) -> bool {
    let (Some(prefix), Some(rest)) = (key.get(..project.len()), key.get(project.len()..)) else {
        return false;
    };
    let number = rest
        .strip_prefix('-')
        .or_else(|| rest.strip_prefix('#'))
        .unwrap_or_default();
    prefix.eq_ignore_ascii_case(project)
        && !number.is_empty()
        && number.chars().all(|ch| ch.is_ascii_digit())
}
