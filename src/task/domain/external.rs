//! External tracker linkage value objects.

use super::TaskDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Supported external issue trackers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrackerSource {
    /// Jira issues, identified by numeric issue ids.
    #[serde(rename = "jira")]
    Jira,
    /// GitHub issues, identified by numeric REST ids.
    #[serde(rename = "github")]
    GitHub,
    /// Linear issues, identified by UUIDs.
    #[serde(rename = "linear")]
    Linear,
}

impl TrackerSource {
    /// Returns the source name in canonical storage format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jira => "jira",
            Self::GitHub => "github",
            Self::Linear => "linear",
        }
    }

    /// Returns whether `external_id` matches this source's id format.
    #[must_use]
    pub fn accepts_external_id(self, external_id: &str) -> bool {
        match self {
            Self::Jira | Self::GitHub => {
                !external_id.is_empty() && external_id.bytes().all(|byte| byte.is_ascii_digit())
            }
            Self::Linear => Uuid::try_parse(external_id).is_ok(),
        }
    }
}

impl TryFrom<&str> for TrackerSource {
    type Error = TaskDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "jira" => Ok(Self::Jira),
            "github" => Ok(Self::GitHub),
            "linear" => Ok(Self::Linear),
            _ => Err(TaskDomainError::InvalidTrackerSource(value.to_owned())),
        }
    }
}

impl fmt::Display for TrackerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Natural reconciliation key: a tracker and its issue identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExternalRef {
    source: TrackerSource,
    external_id: String,
}

impl ExternalRef {
    /// Creates a validated external reference.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidExternalId`] when the identifier does
    /// not match the source's id format.
    pub fn new(source: TrackerSource, external_id: &str) -> Result<Self, TaskDomainError> {
        let normalized = external_id.trim();
        if !source.accepts_external_id(normalized) {
            return Err(TaskDomainError::InvalidExternalId {
                tracker: source,
                value: external_id.to_owned(),
            });
        }
        Ok(Self {
            source,
            external_id: normalized.to_owned(),
        })
    }

    /// Reconstructs a reference from storage without validating it.
    ///
    /// Persisted rows may have drifted through manual edits or partial
    /// syncs; use [`ExternalRef::is_well_formed`] before trusting them.
    #[must_use]
    pub fn from_persisted(source: TrackerSource, external_id: impl Into<String>) -> Self {
        Self {
            source,
            external_id: external_id.into(),
        }
    }

    /// Returns the tracker source.
    #[must_use]
    pub const fn source(&self) -> TrackerSource {
        self.source
    }

    /// Returns the tracker-side identifier.
    #[must_use]
    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    /// Returns whether the identifier matches the source's id format.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.source.accepts_external_id(&self.external_id)
    }
}

impl fmt::Display for ExternalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.external_id)
    }
}

/// Linkage between a local task and its external tracker issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    /// Reconciliation key.
    pub reference: ExternalRef,
    /// Human-facing issue key, such as `PROJ-42`.
    pub key: String,
    /// Browser URL of the issue.
    pub url: Option<String>,
    /// Tracker status name as last observed.
    pub remote_status: Option<String>,
    /// Tracker issue type name as last observed.
    pub remote_issue_type: Option<String>,
    /// Tracker priority name as last observed.
    pub remote_priority: Option<String>,
}

impl ExternalLink {
    /// Creates a link with only the reference and issue key populated.
    #[must_use]
    pub fn new(reference: ExternalRef, key: impl Into<String>) -> Self {
        Self {
            reference,
            key: key.into(),
            url: None,
            remote_status: None,
            remote_issue_type: None,
            remote_priority: None,
        }
    }
}
