//! In-memory task store for tests and single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::task::{
    domain::{ExternalRef, PlatformHandle, Task, TaskId, TaskPatch, TrackerSource, UserId},
    ports::{SourceListing, TaskStore, TaskStoreError, TaskStoreResult, UpsertOutcome},
};

/// Thread-safe in-memory task store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    external_index: HashMap<ExternalRef, TaskId>,
}

impl InMemoryTaskStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> TaskStoreResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state
            .read()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write_state(&self) -> TaskStoreResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state
            .write()
            .map_err(|err| TaskStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

impl InMemoryTaskState {
    /// Fails when `reference` already belongs to a task other than `owner`.
    fn ensure_ref_available(&self, reference: &ExternalRef, owner: TaskId) -> TaskStoreResult<()> {
        match self.external_index.get(reference) {
            Some(existing) if *existing != owner => {
                Err(TaskStoreError::DuplicateExternalRef(reference.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Writes `task`, keeping the external index in step with its link.
    fn put(&mut self, task: Task) {
        let previous_ref = self
            .tasks
            .get(&task.id())
            .and_then(|old| old.external_ref().cloned());
        if let Some(old_ref) = previous_ref
            && task.external_ref() != Some(&old_ref)
        {
            self.external_index.remove(&old_ref);
        }
        if let Some(reference) = task.external_ref() {
            self.external_index.insert(reference.clone(), task.id());
        }
        self.tasks.insert(task.id(), task);
    }

    fn collect<F>(&self, predicate: F) -> Vec<Task>
    where
        F: Fn(&Task) -> bool,
    {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|task| predicate(task))
            .cloned()
            .collect();
        tasks.sort_by_key(|task| (task.created_at(), task.id()));
        tasks
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn store(&self, task: &Task) -> TaskStoreResult<()> {
        let mut state = self.write_state()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskStoreError::DuplicateTask(task.id()));
        }
        if let Some(reference) = task.external_ref() {
            state.ensure_ref_available(reference, task.id())?;
        }
        state.put(task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> TaskStoreResult<()> {
        let mut state = self.write_state()?;
        if !state.tasks.contains_key(&task.id()) {
            return Err(TaskStoreError::NotFound(task.id()));
        }
        if let Some(reference) = task.external_ref() {
            state.ensure_ref_available(reference, task.id())?;
        }
        state.put(task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        let state = self.read_state()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_by_external_ref(
        &self,
        reference: &ExternalRef,
    ) -> TaskStoreResult<Option<Task>> {
        let state = self.read_state()?;
        let task = state
            .external_index
            .get(reference)
            .and_then(|task_id| state.tasks.get(task_id))
            .cloned();
        Ok(task)
    }

    async fn upsert_by_external_ref(
        &self,
        candidate: &Task,
        patch: &TaskPatch,
        at: DateTime<Utc>,
    ) -> TaskStoreResult<UpsertOutcome> {
        let reference = candidate
            .external_ref()
            .cloned()
            .ok_or(TaskStoreError::MissingExternalRef(candidate.id()))?;
        let mut state = self.write_state()?;

        let Some(existing_id) = state.external_index.get(&reference).copied() else {
            if state.tasks.contains_key(&candidate.id()) {
                return Err(TaskStoreError::DuplicateTask(candidate.id()));
            }
            state.put(candidate.clone());
            return Ok(UpsertOutcome::Created(candidate.clone()));
        };

        let mut task = state
            .tasks
            .get(&existing_id)
            .cloned()
            .ok_or(TaskStoreError::NotFound(existing_id))?;
        let revived = task.revive(at);
        let changed = task.apply_remote_patch(patch, at)?;
        if let Some(new_ref) = task.external_ref() {
            state.ensure_ref_available(new_ref, existing_id)?;
        }
        state.put(task.clone());

        if revived {
            Ok(UpsertOutcome::Revived(task))
        } else {
            Ok(UpsertOutcome::Updated { task, changed })
        }
    }

    async fn tombstone(&self, id: TaskId, at: DateTime<Utc>) -> TaskStoreResult<bool> {
        let mut state = self.write_state()?;
        let task = state
            .tasks
            .get_mut(&id)
            .ok_or(TaskStoreError::NotFound(id))?;
        Ok(task.tombstone(at))
    }

    async fn demote(&self, id: TaskId, at: DateTime<Utc>) -> TaskStoreResult<Task> {
        let mut state = self.write_state()?;
        let mut task = state
            .tasks
            .get(&id)
            .cloned()
            .ok_or(TaskStoreError::NotFound(id))?;
        task.demote(at);
        state.put(task.clone());
        Ok(task)
    }

    async fn list_by_source(
        &self,
        source: TrackerSource,
        listing: SourceListing,
    ) -> TaskStoreResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(state.collect(|task| {
            task.external_ref()
                .is_some_and(|reference| reference.source() == source)
                && (listing.include_tombstoned || !task.is_tombstoned())
                && listing.owner.is_none_or(|owner| task.owner_id() == owner)
        }))
    }

    async fn list_by_owner_or_assignment(
        &self,
        owner: UserId,
        handle: Option<&PlatformHandle>,
    ) -> TaskStoreResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(state.collect(|task| {
            !task.is_tombstoned()
                && (task.owner_id() == owner
                    || handle.is_some_and(|value| task.metadata().assignment.involves(value)))
        }))
    }

    async fn list_active(&self) -> TaskStoreResult<Vec<Task>> {
        let state = self.read_state()?;
        Ok(state.collect(|task| !task.is_tombstoned()))
    }
}
