//! User-initiated write-back of task edits to the external tracker.
//!
//! Reconciliation never calls this; it only reads.

use crate::task::{
    domain::{Task, TaskDomainError, TaskId, TaskPatch, TrackerSource},
    ports::{TaskStore, TaskStoreError},
};
use crate::tracker::{
    domain::{IssueFieldUpdate, StatusCategory, remote_priority_name},
    ports::{TrackerClient, TrackerClientError},
};
use mockable::Clock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Workflow transition names used when pushing a status category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    names: BTreeMap<StatusCategory, String>,
}

impl TransitionTable {
    /// Creates a table from explicit entries; missing categories fall back
    /// to the defaults.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (StatusCategory, String)>) -> Self {
        let mut table = Self::default();
        table.names.extend(entries);
        table
    }

    /// Returns the transition name for `category`.
    #[must_use]
    pub fn name_for(&self, category: StatusCategory) -> &str {
        self.names
            .get(&category)
            .map_or_else(|| default_transition(category), String::as_str)
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        let names = [
            StatusCategory::Todo,
            StatusCategory::InProgress,
            StatusCategory::Completed,
        ]
        .into_iter()
        .map(|category| (category, default_transition(category).to_owned()))
        .collect();
        Self { names }
    }
}

const fn default_transition(category: StatusCategory) -> &'static str {
    match category {
        StatusCategory::Todo => "To Do",
        StatusCategory::InProgress => "In Progress",
        StatusCategory::Completed => "Done",
    }
}

/// Errors returned by write-back operations.
#[derive(Debug, Error)]
pub enum WriteBackError {
    /// The task rejected the change or is not linked.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// The store operation failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    /// The tracker rejected the request.
    #[error(transparent)]
    Tracker(#[from] TrackerClientError),
    /// No task exists with the given identifier.
    #[error("task {0} not found")]
    NotFound(TaskId),
    /// The task is linked to a different tracker than the client.
    #[error("task is linked to {linked}, client talks to {client}")]
    SourceMismatch {
        /// Source of the task's link.
        linked: TrackerSource,
        /// Source of the configured client.
        client: TrackerSource,
    },
}

/// Result type for write-back operations.
pub type WriteBackResult<T> = Result<T, WriteBackError>;

/// Pushes local edits of linked tasks to their tracker issue.
#[derive(Clone)]
pub struct TrackerWriteBackService<S, T, C>
where
    S: TaskStore,
    T: TrackerClient,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    tracker: Arc<T>,
    clock: Arc<C>,
    transitions: TransitionTable,
}

impl<S, T, C> TrackerWriteBackService<S, T, C>
where
    S: TaskStore,
    T: TrackerClient,
    C: Clock + Send + Sync,
{
    /// Creates a write-back service.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        tracker: Arc<T>,
        clock: Arc<C>,
        transitions: TransitionTable,
    ) -> Self {
        Self {
            store,
            tracker,
            clock,
            transitions,
        }
    }

    /// Transitions the linked issue to `category` and records the new
    /// remote status and completion locally.
    ///
    /// # Errors
    ///
    /// Returns [`WriteBackError`] when the task is missing, unlinked, linked
    /// to another tracker, or when the tracker or store fails.
    pub async fn push_status(
        &self,
        task_id: TaskId,
        category: StatusCategory,
    ) -> WriteBackResult<Task> {
        let mut task = self.linked_task(task_id).await?;
        let mut link = task
            .external()
            .cloned()
            .ok_or(TaskDomainError::NotLinked(task_id))?;
        let transition = self.transitions.name_for(category).to_owned();

        self.tracker.transition_issue(&link.key, &transition).await?;
        tracing::info!(task_id = %task_id, key = %link.key, %transition, "pushed status transition");

        link.remote_status = Some(transition);
        let patch = TaskPatch::new()
            .with_external(link)
            .with_completed(category == StatusCategory::Completed);
        if task.apply_patch(&patch, self.clock.utc())? {
            self.store.update(&task).await?;
        }
        Ok(task)
    }

    /// Pushes the task's title, priority and due date to the linked issue.
    ///
    /// # Errors
    ///
    /// Returns [`WriteBackError`] when the task is missing, unlinked, linked
    /// to another tracker, or when the tracker rejects the update.
    pub async fn push_fields(&self, task_id: TaskId) -> WriteBackResult<IssueFieldUpdate> {
        let task = self.linked_task(task_id).await?;
        let key = task
            .external()
            .map(|link| link.key.clone())
            .ok_or(TaskDomainError::NotLinked(task_id))?;
        let metadata = task.metadata();
        let update = IssueFieldUpdate {
            summary: Some(task.title().to_owned()),
            priority: Some(remote_priority_name(metadata.priority).to_owned()),
            due_date: Some(metadata.due_date),
        };

        self.tracker.update_issue(&key, &update).await?;
        tracing::info!(task_id = %task_id, %key, "pushed field update");
        Ok(update)
    }

    async fn linked_task(&self, task_id: TaskId) -> WriteBackResult<Task> {
        let task = self
            .store
            .find_by_id(task_id)
            .await?
            .ok_or(WriteBackError::NotFound(task_id))?;
        let reference = task
            .external_ref()
            .ok_or(TaskDomainError::NotLinked(task_id))?;
        if task.is_tombstoned() {
            return Err(TaskDomainError::Tombstoned(task_id).into());
        }
        let client = self.tracker.source();
        if reference.source() != client {
            return Err(WriteBackError::SourceMismatch {
                linked: reference.source(),
                client,
            });
        }
        Ok(task)
    }
}
