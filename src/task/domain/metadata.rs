//! Structured task metadata and typed partial updates.

use super::{ExternalLink, ParseTaskValueError, PlatformHandle, Routing};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Internal task priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Needs attention now.
    Urgent,
    /// Important, schedule soon.
    High,
    /// Normal priority.
    #[default]
    Medium,
    /// Can wait.
    Low,
}

impl Priority {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl TryFrom<&str> for Priority {
    type Error = ParseTaskValueError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "urgent" => Ok(Self::Urgent),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(ParseTaskValueError::new("priority", value)),
        }
    }
}

/// Platform handles involved with a task. Used for visibility only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    /// Handle of whoever assigned the work.
    pub assignor: Option<PlatformHandle>,
    /// Handle of whoever the work is assigned to.
    pub assignee: Option<PlatformHandle>,
    /// Handles mentioned in the originating conversation or issue.
    #[serde(default)]
    pub mentioned: BTreeSet<PlatformHandle>,
}

impl Assignment {
    /// Returns whether `handle` is the assignor, the assignee, or mentioned.
    #[must_use]
    pub fn involves(&self, handle: &PlatformHandle) -> bool {
        self.assignee.as_ref() == Some(handle)
            || self.assignor.as_ref() == Some(handle)
            || self.mentioned.contains(handle)
    }

    /// Iterates over every handle attached to the task.
    pub fn handles(&self) -> impl Iterator<Item = &PlatformHandle> {
        self.assignor
            .iter()
            .chain(self.assignee.iter())
            .chain(self.mentioned.iter())
    }
}

/// Typed metadata carried by every task beyond its identity fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Opaque, possibly rich-text description copied verbatim.
    pub description: Option<Value>,
    /// Internal priority.
    pub priority: Priority,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Due date, if any.
    pub due_date: Option<NaiveDate>,
    /// Handles involved with the task.
    #[serde(default)]
    pub assignment: Assignment,
    /// Track and work type.
    pub routing: Routing,
    /// External tracker link; `None` for purely local tasks.
    pub external: Option<ExternalLink>,
    /// Fields reconciliation must not overwrite.
    #[serde(default)]
    pub pinned: BTreeSet<TrackedField>,
}

impl TaskMetadata {
    /// Creates metadata with defaults for everything but routing.
    #[must_use]
    pub const fn new(routing: Routing) -> Self {
        Self {
            description: None,
            priority: Priority::Medium,
            tags: Vec::new(),
            due_date: None,
            assignment: Assignment {
                assignor: None,
                assignee: None,
                mentioned: BTreeSet::new(),
            },
            routing,
            external: None,
            pinned: BTreeSet::new(),
        }
    }
}

/// Task fields a reconciliation pass refreshes from the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedField {
    /// Task title.
    Title,
    /// Task description.
    Description,
    /// Task priority.
    Priority,
    /// Task labels.
    Tags,
    /// Task due date.
    DueDate,
    /// Assignee handle.
    Assignee,
    /// Assignor (reporter) handle.
    Assignor,
    /// Completion state.
    Completion,
}

/// Field-level partial update. `None` leaves a field untouched.
///
/// Nested options (`Option<Option<_>>`) distinguish "leave as is" from
/// "clear".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description, or `Some(None)` to clear it.
    pub description: Option<Option<Value>>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New labels.
    pub tags: Option<Vec<String>>,
    /// New due date, or `Some(None)` to clear it.
    pub due_date: Option<Option<NaiveDate>>,
    /// New assignee, or `Some(None)` to clear it.
    pub assignee: Option<Option<PlatformHandle>>,
    /// New assignor, or `Some(None)` to clear it.
    pub assignor: Option<Option<PlatformHandle>>,
    /// New mention set.
    pub mentioned: Option<BTreeSet<PlatformHandle>>,
    /// New external link snapshot.
    pub external: Option<ExternalLink>,
    /// New completion state.
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets or clears the description.
    #[must_use]
    pub fn with_description(mut self, description: Option<Value>) -> Self {
        self.description = Some(description);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the labels.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags = Some(tags.into_iter().collect());
        self
    }

    /// Sets or clears the due date.
    #[must_use]
    pub const fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Sets or clears the assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: Option<PlatformHandle>) -> Self {
        self.assignee = Some(assignee);
        self
    }

    /// Sets or clears the assignor.
    #[must_use]
    pub fn with_assignor(mut self, assignor: Option<PlatformHandle>) -> Self {
        self.assignor = Some(assignor);
        self
    }

    /// Replaces the mention set.
    #[must_use]
    pub fn with_mentioned(mut self, mentioned: impl IntoIterator<Item = PlatformHandle>) -> Self {
        self.mentioned = Some(mentioned.into_iter().collect());
        self
    }

    /// Sets the external link snapshot.
    #[must_use]
    pub fn with_external(mut self, external: ExternalLink) -> Self {
        self.external = Some(external);
        self
    }

    /// Sets the completion state.
    #[must_use]
    pub const fn with_completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Returns the tracked fields this patch writes.
    #[must_use]
    pub fn tracked_fields(&self) -> BTreeSet<TrackedField> {
        [
            (self.title.is_some(), TrackedField::Title),
            (self.description.is_some(), TrackedField::Description),
            (self.priority.is_some(), TrackedField::Priority),
            (self.tags.is_some(), TrackedField::Tags),
            (self.due_date.is_some(), TrackedField::DueDate),
            (self.assignee.is_some(), TrackedField::Assignee),
            (self.assignor.is_some(), TrackedField::Assignor),
            (self.completed.is_some(), TrackedField::Completion),
        ]
        .into_iter()
        .filter_map(|(present, field)| present.then_some(field))
        .collect()
    }

    /// Returns a copy of this patch with `pinned` fields removed.
    #[must_use]
    pub fn without(&self, pinned: &BTreeSet<TrackedField>) -> Self {
        let mut masked = self.clone();
        for field in pinned {
            match field {
                TrackedField::Title => masked.title = None,
                TrackedField::Description => masked.description = None,
                TrackedField::Priority => masked.priority = None,
                TrackedField::Tags => masked.tags = None,
                TrackedField::DueDate => masked.due_date = None,
                TrackedField::Assignee => masked.assignee = None,
                TrackedField::Assignor => masked.assignor = None,
                TrackedField::Completion => masked.completed = None,
            }
        }
        masked
    }
}
