//! Tracker-side issue payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A `{ "name": ... }` object as trackers return for status, priority and
/// issue type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedField {
    /// Display name.
    pub name: String,
}

impl NamedField {
    /// Creates a named field.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Issue as returned by a tracker query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIssue {
    /// Tracker-side identifier; the reconciliation key.
    pub remote_id: String,
    /// Human-facing key, such as `PROJ-42`.
    pub key: String,
    /// Browser URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Issue title.
    pub summary: String,
    /// Opaque description document.
    #[serde(default)]
    pub description: Option<Value>,
    /// Workflow status.
    #[serde(default)]
    pub status: Option<NamedField>,
    /// Priority.
    #[serde(default)]
    pub priority: Option<NamedField>,
    /// Issue type.
    #[serde(default)]
    pub issue_type: Option<NamedField>,
    /// Assignee account handle.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Reporter account handle.
    #[serde(default)]
    pub reporter: Option<String>,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Labels.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl RemoteIssue {
    /// Creates an issue with only identity fields and a summary.
    #[must_use]
    pub fn new(
        remote_id: impl Into<String>,
        key: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            key: key.into(),
            url: None,
            summary: summary.into(),
            description: None,
            status: None,
            priority: None,
            issue_type: None,
            assignee: None,
            reporter: None,
            due_date: None,
            labels: Vec::new(),
        }
    }

    /// Sets the status name.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(NamedField::new(status));
        self
    }

    /// Sets the priority name.
    #[must_use]
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(NamedField::new(priority));
        self
    }

    /// Sets the issue type name.
    #[must_use]
    pub fn with_issue_type(mut self, issue_type: impl Into<String>) -> Self {
        self.issue_type = Some(NamedField::new(issue_type));
        self
    }

    /// Sets the assignee handle.
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Sets the reporter handle.
    #[must_use]
    pub fn with_reporter(mut self, reporter: impl Into<String>) -> Self {
        self.reporter = Some(reporter.into());
        self
    }

    /// Sets the browser URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the description document.
    #[must_use]
    pub fn with_description(mut self, description: Value) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets the labels.
    #[must_use]
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = String>) -> Self {
        self.labels = labels.into_iter().collect();
        self
    }

    /// Returns the status name, or an empty string when absent.
    #[must_use]
    pub fn status_name(&self) -> &str {
        self.status.as_ref().map_or("", |field| field.name.as_str())
    }

    /// Returns the priority name, or an empty string when absent.
    #[must_use]
    pub fn priority_name(&self) -> &str {
        self.priority.as_ref().map_or("", |field| field.name.as_str())
    }
}

/// Field changes pushed to a tracker issue on user-initiated edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFieldUpdate {
    /// New summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// New priority name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// New due date, or `Some(None)` to clear.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl IssueFieldUpdate {
    /// Returns whether the update carries no changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.summary.is_none() && self.priority.is_none() && self.due_date.is_none()
    }
}
