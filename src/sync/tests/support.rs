//! Shared fixtures and a store double with injectable failures.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::sync::domain::{SyncScope, SyncSettings};
use crate::sync::services::ReconciliationService;
use crate::task::{
    adapters::memory::InMemoryTaskStore,
    domain::{
        ExternalRef, PlatformHandle, Route, Task, TaskId, TaskPatch, TrackerSource, UserId,
    },
    ports::{SourceListing, TaskStore, TaskStoreError, TaskStoreResult, UpsertOutcome},
};
use crate::tracker::adapters::memory::InMemoryTrackerClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::DefaultClock;

pub type MemoryEngine =
    ReconciliationService<InMemoryTaskStore, InMemoryTrackerClient, DefaultClock>;

pub fn settings(max_results: u32) -> SyncSettings {
    SyncSettings {
        max_results,
        tracker_route: Route::TrackB,
    }
}

pub fn projects_scope(owner: UserId) -> SyncScope {
    SyncScope::projects(owner, ["X"])
}

pub fn alice_scope(owner: UserId) -> SyncScope {
    SyncScope::assigned_to(owner, PlatformHandle::new("alice").expect("valid handle"))
}

pub fn engine(
    store: &Arc<InMemoryTaskStore>,
    tracker: &Arc<InMemoryTrackerClient>,
    max_results: u32,
) -> MemoryEngine {
    ReconciliationService::new(
        Arc::clone(store),
        Arc::clone(tracker),
        Arc::new(DefaultClock),
        settings(max_results),
    )
}

pub async fn task_for(store: &InMemoryTaskStore, external_id: &str) -> Task {
    let reference = ExternalRef::new(TrackerSource::Jira, external_id).expect("valid reference");
    store
        .find_by_external_ref(&reference)
        .await
        .expect("lookup")
        .expect("task exists")
}

pub async fn snapshot(store: &InMemoryTaskStore) -> Vec<Task> {
    store
        .list_by_source(
            TrackerSource::Jira,
            SourceListing {
                include_tombstoned: true,
                owner: None,
            },
        )
        .await
        .expect("list tasks")
}

/// Delegates to an in-memory store, failing selected calls.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryTaskStore,
    fail_listing: bool,
    failing_upserts: Mutex<HashSet<String>>,
}

impl FlakyStore {
    pub fn failing_listing() -> Self {
        Self {
            fail_listing: true,
            ..Self::default()
        }
    }

    pub fn fail_upsert_of(&self, external_id: &str) {
        self.failing_upserts
            .lock()
            .expect("lock")
            .insert(external_id.to_owned());
    }

    pub const fn inner(&self) -> &InMemoryTaskStore {
        &self.inner
    }

    fn injected() -> TaskStoreError {
        TaskStoreError::persistence(std::io::Error::other("injected failure"))
    }
}

#[async_trait]
impl TaskStore for FlakyStore {
    async fn store(&self, task: &Task) -> TaskStoreResult<()> {
        self.inner.store(task).await
    }

    async fn update(&self, task: &Task) -> TaskStoreResult<()> {
        self.inner.update(task).await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_external_ref(
        &self,
        reference: &ExternalRef,
    ) -> TaskStoreResult<Option<Task>> {
        self.inner.find_by_external_ref(reference).await
    }

    async fn upsert_by_external_ref(
        &self,
        candidate: &Task,
        patch: &TaskPatch,
        at: DateTime<Utc>,
    ) -> TaskStoreResult<UpsertOutcome> {
        let failing = candidate.external_ref().is_some_and(|reference| {
            self.failing_upserts
                .lock()
                .expect("lock")
                .contains(reference.external_id())
        });
        if failing {
            return Err(Self::injected());
        }
        self.inner.upsert_by_external_ref(candidate, patch, at).await
    }

    async fn tombstone(&self, id: TaskId, at: DateTime<Utc>) -> TaskStoreResult<bool> {
        self.inner.tombstone(id, at).await
    }

    async fn demote(&self, id: TaskId, at: DateTime<Utc>) -> TaskStoreResult<Task> {
        self.inner.demote(id, at).await
    }

    async fn list_by_source(
        &self,
        source: TrackerSource,
        listing: SourceListing,
    ) -> TaskStoreResult<Vec<Task>> {
        if self.fail_listing {
            return Err(Self::injected());
        }
        self.inner.list_by_source(source, listing).await
    }

    async fn list_by_owner_or_assignment(
        &self,
        owner: UserId,
        handle: Option<&PlatformHandle>,
    ) -> TaskStoreResult<Vec<Task>> {
        self.inner.list_by_owner_or_assignment(owner, handle).await
    }

    async fn list_active(&self) -> TaskStoreResult<Vec<Task>> {
        self.inner.list_active().await
    }
}
