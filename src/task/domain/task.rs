//! Task aggregate root and lifecycle types.

use super::{
    ExternalLink, ExternalRef, ParseTaskValueError, Routing, TaskDomainError, TaskId,
    TaskMetadata, TaskPatch, TrackedField, UserId,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Task lifecycle state.
///
/// A tombstoned task always carries a completion timestamp, so
/// "tombstoned implies completed" holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskLifecycle {
    /// Open work.
    Active,
    /// Work finished, locally or by remote status.
    Completed {
        /// When the task was completed.
        completed_at: DateTime<Utc>,
    },
    /// Soft-deleted: the remote counterpart vanished from its scope.
    Tombstoned {
        /// When the task was completed (at the latest, when tombstoned).
        completed_at: DateTime<Utc>,
        /// When the task was tombstoned.
        tombstoned_at: DateTime<Utc>,
    },
}

impl TaskLifecycle {
    /// Returns the canonical storage representation of the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed { .. } => "completed",
            Self::Tombstoned { .. } => "tombstoned",
        }
    }

    /// Rebuilds a lifecycle from its persisted columns.
    ///
    /// # Errors
    ///
    /// Returns [`ParseTaskValueError`] when the state name is unknown or a
    /// required timestamp is missing.
    pub fn from_parts(
        state: &str,
        completed_at: Option<DateTime<Utc>>,
        tombstoned_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ParseTaskValueError> {
        match (state.trim(), completed_at, tombstoned_at) {
            ("active", _, _) => Ok(Self::Active),
            ("completed", Some(completed), _) => Ok(Self::Completed {
                completed_at: completed,
            }),
            ("tombstoned", completed, Some(tombstoned)) => Ok(Self::Tombstoned {
                completed_at: completed.unwrap_or(tombstoned),
                tombstoned_at: tombstoned,
            }),
            _ => Err(ParseTaskValueError::new("task lifecycle", state)),
        }
    }

    /// Returns whether the task counts as completed.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Returns whether the task is tombstoned.
    #[must_use]
    pub const fn is_tombstoned(self) -> bool {
        matches!(self, Self::Tombstoned { .. })
    }

    /// Returns the completion timestamp, if completed.
    #[must_use]
    pub const fn completed_at(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Active => None,
            Self::Completed { completed_at } | Self::Tombstoned { completed_at, .. } => {
                Some(completed_at)
            }
        }
    }

    /// Returns the tombstone timestamp, if tombstoned.
    #[must_use]
    pub const fn tombstoned_at(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Tombstoned { tombstoned_at, .. } => Some(tombstoned_at),
            Self::Active | Self::Completed { .. } => None,
        }
    }
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    owner_id: UserId,
    title: String,
    metadata: TaskMetadata,
    lifecycle: TaskLifecycle,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted owner.
    pub owner_id: UserId,
    /// Persisted title.
    pub title: String,
    /// Persisted metadata.
    pub metadata: TaskMetadata,
    /// Persisted lifecycle state.
    pub lifecycle: TaskLifecycle,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest change timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a new active task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] if the title is blank.
    pub fn new(
        owner_id: UserId,
        title: impl Into<String>,
        routing: Routing,
        clock: &impl Clock,
    ) -> Result<Self, TaskDomainError> {
        Self::new_at(owner_id, title, routing, clock.utc())
    }

    /// Creates a new active task stamped with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::EmptyTitle`] if the title is blank.
    pub fn new_at(
        owner_id: UserId,
        title: impl Into<String>,
        routing: Routing,
        at: DateTime<Utc>,
    ) -> Result<Self, TaskDomainError> {
        Ok(Self {
            id: TaskId::new(),
            owner_id,
            title: normalize_title(title.into())?,
            metadata: TaskMetadata::new(routing),
            lifecycle: TaskLifecycle::Active,
            created_at: at,
            updated_at: at,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            owner_id: data.owner_id,
            title: data.title,
            metadata: data.metadata,
            lifecycle: data.lifecycle,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning local user.
    #[must_use]
    pub const fn owner_id(&self) -> UserId {
        self.owner_id
    }

    /// Returns the title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the structured metadata.
    #[must_use]
    pub const fn metadata(&self) -> &TaskMetadata {
        &self.metadata
    }

    /// Returns the external link, if any.
    #[must_use]
    pub const fn external(&self) -> Option<&ExternalLink> {
        self.metadata.external.as_ref()
    }

    /// Returns the reconciliation key, if the task is externally linked.
    #[must_use]
    pub fn external_ref(&self) -> Option<&ExternalRef> {
        self.external().map(|link| &link.reference)
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn lifecycle(&self) -> TaskLifecycle {
        self.lifecycle
    }

    /// Returns whether the task is completed (tombstoned tasks included).
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.lifecycle.is_completed()
    }

    /// Returns whether the task is tombstoned.
    #[must_use]
    pub const fn is_tombstoned(&self) -> bool {
        self.lifecycle.is_tombstoned()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest change timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Applies a field-level update. Only fields present in `patch` change.
    ///
    /// Returns `true` when any stored value changed; `updated_at` moves only
    /// in that case, so applying the same patch twice is a no-op the second
    /// time.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Tombstoned`] for tombstoned tasks and
    /// [`TaskDomainError::EmptyTitle`] for a blank replacement title. Nothing
    /// is modified on error.
    pub fn apply_patch(
        &mut self,
        patch: &TaskPatch,
        at: DateTime<Utc>,
    ) -> Result<bool, TaskDomainError> {
        self.ensure_not_tombstoned()?;
        let title = patch.title.clone().map(normalize_title).transpose()?;

        let metadata = &mut self.metadata;
        let mut changed = false;
        if let Some(value) = title {
            changed |= replace(&mut self.title, value);
        }
        if let Some(value) = &patch.description {
            changed |= replace(&mut metadata.description, value.clone());
        }
        if let Some(value) = patch.priority {
            changed |= replace(&mut metadata.priority, value);
        }
        if let Some(value) = &patch.tags {
            changed |= replace(&mut metadata.tags, normalize_tags(value));
        }
        if let Some(value) = patch.due_date {
            changed |= replace(&mut metadata.due_date, value);
        }
        if let Some(value) = &patch.assignee {
            changed |= replace(&mut metadata.assignment.assignee, value.clone());
        }
        if let Some(value) = &patch.assignor {
            changed |= replace(&mut metadata.assignment.assignor, value.clone());
        }
        if let Some(value) = &patch.mentioned {
            changed |= replace(&mut metadata.assignment.mentioned, value.clone());
        }
        if let Some(value) = &patch.external {
            changed |= replace(&mut metadata.external, Some(value.clone()));
        }
        if let Some(completed) = patch.completed {
            changed |= self.set_completed(completed, at);
        }

        if changed {
            self.updated_at = at;
        }
        Ok(changed)
    }

    /// Applies a tracker-originated update, skipping pinned fields.
    ///
    /// # Errors
    ///
    /// Same as [`Task::apply_patch`].
    pub fn apply_remote_patch(
        &mut self,
        patch: &TaskPatch,
        at: DateTime<Utc>,
    ) -> Result<bool, TaskDomainError> {
        if self.metadata.pinned.is_empty() {
            return self.apply_patch(patch, at);
        }
        let masked = patch.without(&self.metadata.pinned);
        self.apply_patch(&masked, at)
    }

    /// Marks the task completed. Returns `false` if it already was.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Tombstoned`] for tombstoned tasks.
    pub fn complete(&mut self, clock: &impl Clock) -> Result<bool, TaskDomainError> {
        self.ensure_not_tombstoned()?;
        let now = clock.utc();
        let changed = self.set_completed(true, now);
        self.touch_if(changed, now);
        Ok(changed)
    }

    /// Reopens a completed task. Returns `false` if it was already active.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Tombstoned`] for tombstoned tasks.
    pub fn reopen(&mut self, clock: &impl Clock) -> Result<bool, TaskDomainError> {
        self.ensure_not_tombstoned()?;
        let now = clock.utc();
        let changed = self.set_completed(false, now);
        self.touch_if(changed, now);
        Ok(changed)
    }

    /// Replaces the routing decision.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Tombstoned`] for tombstoned tasks.
    pub fn reroute(&mut self, routing: Routing, clock: &impl Clock) -> Result<bool, TaskDomainError> {
        self.ensure_not_tombstoned()?;
        let changed = replace(&mut self.metadata.routing, routing);
        self.touch_if(changed, clock.utc());
        Ok(changed)
    }

    /// Pins fields so reconciliation stops overwriting them.
    pub fn pin(&mut self, fields: &BTreeSet<TrackedField>, at: DateTime<Utc>) -> bool {
        let before = self.metadata.pinned.len();
        self.metadata.pinned.extend(fields.iter().copied());
        let changed = self.metadata.pinned.len() != before;
        self.touch_if(changed, at);
        changed
    }

    /// Releases pinned fields so the next reconciliation refreshes them.
    pub fn release_pins(&mut self, fields: &BTreeSet<TrackedField>, at: DateTime<Utc>) -> bool {
        let before = self.metadata.pinned.len();
        self.metadata.pinned.retain(|field| !fields.contains(field));
        let changed = self.metadata.pinned.len() != before;
        self.touch_if(changed, at);
        changed
    }

    /// Soft-deletes the task. Returns `false` if it was already tombstoned.
    pub fn tombstone(&mut self, at: DateTime<Utc>) -> bool {
        let completed_at = match self.lifecycle {
            TaskLifecycle::Tombstoned { .. } => return false,
            TaskLifecycle::Active => at,
            TaskLifecycle::Completed { completed_at } => completed_at,
        };
        self.lifecycle = TaskLifecycle::Tombstoned {
            completed_at,
            tombstoned_at: at,
        };
        self.updated_at = at;
        true
    }

    /// Brings a tombstoned task back as completed. Returns `false` if the
    /// task was not tombstoned.
    ///
    /// Callers follow up with a patch carrying the current remote state.
    pub fn revive(&mut self, at: DateTime<Utc>) -> bool {
        let TaskLifecycle::Tombstoned { completed_at, .. } = self.lifecycle else {
            return false;
        };
        self.lifecycle = TaskLifecycle::Completed { completed_at };
        self.updated_at = at;
        true
    }

    /// Strips the external link, turning the task into a local one.
    ///
    /// Returns the removed link. Pins are dropped with it since nothing
    /// reconciles the task anymore.
    pub fn demote(&mut self, at: DateTime<Utc>) -> Option<ExternalLink> {
        let link = self.metadata.external.take()?;
        self.metadata.pinned.clear();
        self.updated_at = at;
        Some(link)
    }

    fn ensure_not_tombstoned(&self) -> Result<(), TaskDomainError> {
        if self.lifecycle.is_tombstoned() {
            return Err(TaskDomainError::Tombstoned(self.id));
        }
        Ok(())
    }

    fn set_completed(&mut self, completed: bool, at: DateTime<Utc>) -> bool {
        match (self.lifecycle, completed) {
            (TaskLifecycle::Active, true) => {
                self.lifecycle = TaskLifecycle::Completed { completed_at: at };
                true
            }
            (TaskLifecycle::Completed { .. }, false) => {
                self.lifecycle = TaskLifecycle::Active;
                true
            }
            _ => false,
        }
    }

    fn touch_if(&mut self, changed: bool, at: DateTime<Utc>) {
        if changed {
            self.updated_at = at;
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn normalize_title(raw: String) -> Result<String, TaskDomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TaskDomainError::EmptyTitle);
    }
    Ok(trimmed.to_owned())
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| tag.trim().to_owned())
        .filter(|tag| !tag.is_empty())
        .collect()
}
