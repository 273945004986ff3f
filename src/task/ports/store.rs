//! Store port for task persistence, external-key upserts and soft deletes.

use crate::task::domain::{
    ExternalRef, PlatformHandle, Task, TaskDomainError, TaskId, TaskPatch, TrackerSource, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Options for [`TaskStore::list_by_source`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceListing {
    /// Include tombstoned tasks.
    pub include_tombstoned: bool,
    /// Restrict to one owner; `None` lists across all owners.
    pub owner: Option<UserId>,
}

impl SourceListing {
    /// Lists live tasks of every owner.
    #[must_use]
    pub const fn all_owners() -> Self {
        Self {
            include_tombstoned: false,
            owner: None,
        }
    }
}

/// Outcome of [`TaskStore::upsert_by_external_ref`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No task had the external reference; the candidate was inserted.
    Created(Task),
    /// An existing task was refreshed. `changed` is `false` when every
    /// provided field already held the incoming value.
    Updated {
        /// The task after the refresh.
        task: Task,
        /// Whether any stored value changed.
        changed: bool,
    },
    /// A tombstoned task reappeared remotely and was brought back.
    Revived(Task),
}

impl UpsertOutcome {
    /// Returns the stored task.
    #[must_use]
    pub const fn task(&self) -> &Task {
        match self {
            Self::Created(task) | Self::Revived(task) | Self::Updated { task, .. } => task,
        }
    }
}

/// Task persistence contract.
///
/// Implementations never hard-delete: tasks leave default listings only by
/// being tombstoned.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateTask`] when the task ID already
    /// exists or [`TaskStoreError::DuplicateExternalRef`] when another task
    /// already carries the same external reference.
    async fn store(&self, task: &Task) -> TaskStoreResult<()>;

    /// Replaces an existing task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist or
    /// [`TaskStoreError::DuplicateExternalRef`] when the new external
    /// reference belongs to another task.
    async fn update(&self, task: &Task) -> TaskStoreResult<()>;

    /// Finds a task by local identifier.
    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>>;

    /// Finds the task linked to an external reference, tombstoned or not.
    async fn find_by_external_ref(&self, reference: &ExternalRef)
    -> TaskStoreResult<Option<Task>>;

    /// Inserts `candidate` or merges `patch` into the task that already
    /// carries the candidate's external reference.
    ///
    /// The merge is a tracker refresh: pinned fields are skipped, and a
    /// tombstoned match is revived before the patch applies. Calling this
    /// twice with the same input leaves the store unchanged the second time.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::MissingExternalRef`] when the candidate is
    /// not externally linked and [`TaskStoreError::Domain`] when the patch is
    /// rejected.
    async fn upsert_by_external_ref(
        &self,
        candidate: &Task,
        patch: &TaskPatch,
        at: DateTime<Utc>,
    ) -> TaskStoreResult<UpsertOutcome>;

    /// Tombstones a task. Returns `false` when it was already tombstoned.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist.
    async fn tombstone(&self, id: TaskId, at: DateTime<Utc>) -> TaskStoreResult<bool>;

    /// Strips a task's external link, returning the updated task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist.
    async fn demote(&self, id: TaskId, at: DateTime<Utc>) -> TaskStoreResult<Task>;

    /// Lists tasks linked to `source`.
    async fn list_by_source(
        &self,
        source: TrackerSource,
        listing: SourceListing,
    ) -> TaskStoreResult<Vec<Task>>;

    /// Lists live tasks owned by `owner` or whose assignee, assignor or
    /// mentions include `handle`.
    async fn list_by_owner_or_assignment(
        &self,
        owner: UserId,
        handle: Option<&PlatformHandle>,
    ) -> TaskStoreResult<Vec<Task>>;

    /// Lists every live task.
    async fn list_active(&self) -> TaskStoreResult<Vec<Task>>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// Another task already carries the external reference.
    #[error("duplicate external reference: {0}")]
    DuplicateExternalRef(ExternalRef),

    /// An external-key operation was given a local task.
    #[error("task {0} has no external reference")]
    MissingExternalRef(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The stored task rejected the change.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
