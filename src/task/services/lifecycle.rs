//! Service layer for local task creation, user edits and retrieval.

use crate::task::{
    domain::{
        ExternalRef, PlatformHandle, Priority, Role, RoutePolicy, Routing, Task, TaskDomainError,
        TaskId, TaskPatch, TrackedField, UserId, WorkType,
    },
    ports::{TaskStore, TaskStoreError},
};
use chrono::{DateTime, NaiveDate, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// How local edits of tracked fields interact with reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Editing a tracked field of a linked task pins it until released.
    #[default]
    LocalPins,
    /// The next reconciliation pass overwrites local edits.
    RemoteWins,
}

/// Request payload for creating a local task.
///
/// Upstream producers such as a message task detector emit these; routing
/// is derived from the creator's role unless set explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    owner: UserId,
    creator_role: Role,
    title: String,
    work_type: WorkType,
    routing: Option<Routing>,
    patch: TaskPatch,
}

impl CreateTaskRequest {
    /// Creates a request with required fields.
    #[must_use]
    pub fn new(
        owner: UserId,
        creator_role: Role,
        title: impl Into<String>,
        work_type: WorkType,
    ) -> Self {
        Self {
            owner,
            creator_role,
            title: title.into(),
            work_type,
            routing: None,
            patch: TaskPatch::new(),
        }
    }

    /// Overrides the role-derived routing.
    #[must_use]
    pub const fn with_routing(mut self, routing: Routing) -> Self {
        self.routing = Some(routing);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: Value) -> Self {
        self.patch = self.patch.with_description(Some(description));
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.patch = self.patch.with_priority(priority);
        self
    }

    /// Sets the labels.
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.patch = self.patch.with_tags(tags);
        self
    }

    /// Sets the due date.
    #[must_use]
    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.patch = self.patch.with_due_date(Some(due_date));
        self
    }

    /// Sets the assignee and assignor handles.
    #[must_use]
    pub fn with_assignment(
        mut self,
        assignee: Option<PlatformHandle>,
        assignor: Option<PlatformHandle>,
    ) -> Self {
        self.patch = self.patch.with_assignee(assignee).with_assignor(assignor);
        self
    }

    /// Sets the handles mentioned alongside the task.
    #[must_use]
    pub fn with_mentioned(mut self, mentioned: impl IntoIterator<Item = PlatformHandle>) -> Self {
        self.patch = self.patch.with_mentioned(mentioned);
        self
    }
}

/// Service-level errors for task lifecycle operations.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] TaskStoreError),
    /// External links are only written by reconciliation.
    #[error("external link of task {0} cannot be edited")]
    LinkNotEditable(TaskId),
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task lifecycle orchestration service.
#[derive(Clone)]
pub struct TaskLifecycleService<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    routes: RoutePolicy,
    conflicts: ConflictPolicy,
}

impl<S, C> TaskLifecycleService<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub const fn new(
        store: Arc<S>,
        clock: Arc<C>,
        routes: RoutePolicy,
        conflicts: ConflictPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            routes,
            conflicts,
        }
    }

    /// Creates and stores a local task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError`] when the title is blank or the store
    /// rejects the task.
    pub async fn create_local(&self, request: CreateTaskRequest) -> TaskLifecycleResult<Task> {
        let routing = request.routing.unwrap_or_else(|| {
            self.routes
                .route_for(&request.creator_role, request.work_type)
        });
        let now = self.clock.utc();
        let mut task = Task::new_at(request.owner, request.title, routing, now)?;
        task.apply_patch(&request.patch, now)?;
        self.store.store(&task).await?;
        tracing::info!(
            task_id = %task.id(),
            route = routing.route_to.as_str(),
            work_type = routing.work_type.as_str(),
            "created local task"
        );
        Ok(task)
    }

    /// Applies a user edit.
    ///
    /// Under [`ConflictPolicy::LocalPins`] the tracked fields the patch
    /// writes are pinned on linked tasks, so reconciliation keeps the local
    /// values until [`TaskLifecycleService::release_pins`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::LinkNotEditable`] when the patch
    /// carries an external link, [`TaskDomainError::Tombstoned`] for
    /// tombstoned tasks, and store errors otherwise.
    pub async fn edit(&self, id: TaskId, patch: &TaskPatch) -> TaskLifecycleResult<Task> {
        if patch.external.is_some() {
            return Err(TaskLifecycleError::LinkNotEditable(id));
        }
        let mut task = self.load(id).await?;
        let now = self.clock.utc();
        let changed = task.apply_patch(patch, now)?;
        let pinned = self.pin_local_edit(&mut task, &patch.tracked_fields(), now);
        if changed || pinned {
            self.store.update(&task).await?;
        }
        Ok(task)
    }

    /// Unpins fields so the next reconciliation pass refreshes them.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError`] when the task is missing or the store
    /// fails.
    pub async fn release_pins(
        &self,
        id: TaskId,
        fields: &BTreeSet<TrackedField>,
    ) -> TaskLifecycleResult<Task> {
        let mut task = self.load(id).await?;
        if task.release_pins(fields, self.clock.utc()) {
            self.store.update(&task).await?;
            tracing::debug!(task_id = %id, ?fields, "released pinned fields");
        }
        Ok(task)
    }

    /// Marks a task completed.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Tombstoned`] for tombstoned tasks and store
    /// errors otherwise.
    pub async fn complete(&self, id: TaskId) -> TaskLifecycleResult<Task> {
        self.set_completion(id, true).await
    }

    /// Reopens a completed task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Tombstoned`] for tombstoned tasks and store
    /// errors otherwise.
    pub async fn reopen(&self, id: TaskId) -> TaskLifecycleResult<Task> {
        self.set_completion(id, false).await
    }

    /// Replaces a task's routing.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::Tombstoned`] for tombstoned tasks and store
    /// errors otherwise.
    pub async fn reroute(&self, id: TaskId, routing: Routing) -> TaskLifecycleResult<Task> {
        let mut task = self.load(id).await?;
        if task.reroute(routing, &*self.clock)? {
            self.store.update(&task).await?;
        }
        Ok(task)
    }

    /// Retrieves a task by local identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Store`] when the lookup fails.
    pub async fn find_by_id(&self, id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.store.find_by_id(id).await?)
    }

    /// Retrieves the task linked to an external reference, tombstoned or
    /// not.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Store`] when the lookup fails.
    pub async fn find_by_external_ref(
        &self,
        reference: &ExternalRef,
    ) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.store.find_by_external_ref(reference).await?)
    }

    async fn load(&self, id: TaskId) -> TaskLifecycleResult<Task> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(TaskLifecycleError::Store(TaskStoreError::NotFound(id)))
    }

    async fn set_completion(&self, id: TaskId, completed: bool) -> TaskLifecycleResult<Task> {
        let mut task = self.load(id).await?;
        let changed = if completed {
            task.complete(&*self.clock)?
        } else {
            task.reopen(&*self.clock)?
        };
        let pinned = self.pin_local_edit(
            &mut task,
            &BTreeSet::from([TrackedField::Completion]),
            self.clock.utc(),
        );
        if changed || pinned {
            self.store.update(&task).await?;
        }
        Ok(task)
    }

    fn pin_local_edit(
        &self,
        task: &mut Task,
        fields: &BTreeSet<TrackedField>,
        at: DateTime<Utc>,
    ) -> bool {
        if self.conflicts == ConflictPolicy::RemoteWins || task.external().is_none() {
            return false;
        }
        let pinned = task.pin(fields, at);
        if pinned {
            tracing::debug!(task_id = %task.id(), ?fields, "pinned locally edited fields");
        }
        pinned
    }
}
