//! `PostgreSQL` task store implementation.

use super::{
    models::{NewTaskRow, TaskRow},
    schema::tasks,
};
use crate::task::{
    domain::{
        ExternalRef, PersistedTaskData, PlatformHandle, Task, TaskId, TaskLifecycle, TaskMetadata,
        TaskPatch, TrackerSource, UserId,
    },
    ports::{SourceListing, TaskStore, TaskStoreError, TaskStoreResult, UpsertOutcome},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by the task store.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

const TOMBSTONED: &str = "tombstoned";
const EXTERNAL_REF_UNIQUE_INDEX: &str = "idx_tasks_external_ref_unique";

/// `PostgreSQL`-backed task store.
#[derive(Debug, Clone)]
pub struct PostgresTaskStore {
    pool: TaskPgPool,
}

impl PostgresTaskStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskStoreError::persistence)?
    }
}

impl From<DieselError> for TaskStoreError {
    fn from(err: DieselError) -> Self {
        Self::persistence(err)
    }
}

#[async_trait]
impl TaskStore for PostgresTaskStore {
    async fn store(&self, task: &Task) -> TaskStoreResult<()> {
        let task_id = task.id();
        let reference = task.external_ref().cloned();
        let new_row = to_row(task)?;

        self.run_blocking(move |connection| {
            // The pre-check only sharpens the error; the unique index still
            // guards the window between check and insert.
            if let Some(existing_ref) = &reference
                && find_row_by_external_ref(connection, existing_ref)?.is_some()
            {
                return Err(TaskStoreError::DuplicateExternalRef(existing_ref.clone()));
            }

            diesel::insert_into(tasks::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| map_write_error(err, task_id, reference.as_ref()))?;
            Ok(())
        })
        .await
    }

    async fn update(&self, task: &Task) -> TaskStoreResult<()> {
        let task_id = task.id();
        let reference = task.external_ref().cloned();
        let row = to_row(task)?;

        self.run_blocking(move |connection| {
            let updated_count = diesel::update(tasks::table.filter(tasks::id.eq(row.id)))
                .set(&row)
                .execute(connection)
                .map_err(|err| map_write_error(err, task_id, reference.as_ref()))?;
            if updated_count == 0 {
                return Err(TaskStoreError::NotFound(task_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskStoreResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_by_external_ref(
        &self,
        reference: &ExternalRef,
    ) -> TaskStoreResult<Option<Task>> {
        let lookup = reference.clone();
        self.run_blocking(move |connection| {
            find_row_by_external_ref(connection, &lookup)?
                .map(row_to_task)
                .transpose()
        })
        .await
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
        let candidate_task = candidate.clone();
        let candidate_row = to_row(candidate)?;
        let remote_patch = patch.clone();

        self.run_blocking(move |connection| {
            connection.transaction::<_, TaskStoreError, _>(|tx| {
                let existing = tasks::table
                    .filter(tasks::source.eq(reference.source().as_str()))
                    .filter(tasks::external_id.eq(reference.external_id()))
                    .select(TaskRow::as_select())
                    .for_update()
                    .first::<TaskRow>(tx)
                    .optional()?;

                let Some(row) = existing else {
                    diesel::insert_into(tasks::table)
                        .values(&candidate_row)
                        .execute(tx)
                        .map_err(|err| {
                            map_write_error(err, candidate_task.id(), Some(&reference))
                        })?;
                    return Ok(UpsertOutcome::Created(candidate_task));
                };

                let mut task = row_to_task(row)?;
                let revived = task.revive(at);
                let changed = task.apply_remote_patch(&remote_patch, at)?;
                if revived || changed {
                    let updated_row = to_row(&task)?;
                    diesel::update(tasks::table.filter(tasks::id.eq(updated_row.id)))
                        .set(&updated_row)
                        .execute(tx)
                        .map_err(|err| map_write_error(err, task.id(), Some(&reference)))?;
                }

                if revived {
                    Ok(UpsertOutcome::Revived(task))
                } else {
                    Ok(UpsertOutcome::Updated { task, changed })
                }
            })
        })
        .await
    }

    async fn tombstone(&self, id: TaskId, at: DateTime<Utc>) -> TaskStoreResult<bool> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, TaskStoreError, _>(|tx| {
                let mut task = lock_task(tx, id)?;
                if !task.tombstone(at) {
                    return Ok(false);
                }
                write_row(tx, &task)?;
                Ok(true)
            })
        })
        .await
    }

    async fn demote(&self, id: TaskId, at: DateTime<Utc>) -> TaskStoreResult<Task> {
        self.run_blocking(move |connection| {
            connection.transaction::<_, TaskStoreError, _>(|tx| {
                let mut task = lock_task(tx, id)?;
                if task.demote(at).is_some() {
                    write_row(tx, &task)?;
                }
                Ok(task)
            })
        })
        .await
    }

    async fn list_by_source(
        &self,
        source: TrackerSource,
        listing: SourceListing,
    ) -> TaskStoreResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let mut query = tasks::table
                .filter(tasks::source.eq(source.as_str()))
                .select(TaskRow::as_select())
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .into_boxed();
            if !listing.include_tombstoned {
                query = query.filter(tasks::lifecycle.ne(TOMBSTONED));
            }
            if let Some(owner) = listing.owner {
                query = query.filter(tasks::owner_id.eq(owner.into_inner()));
            }
            let rows = query.load::<TaskRow>(connection)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn list_by_owner_or_assignment(
        &self,
        owner: UserId,
        handle: Option<&PlatformHandle>,
    ) -> TaskStoreResult<Vec<Task>> {
        let handle_value = handle.map(|value| value.as_str().to_owned());
        self.run_blocking(move |connection| {
            let query = diesel::sql_query(concat!(
                "SELECT id, owner_id, title, lifecycle, completed_at, tombstoned_at, source, ",
                "external_id, metadata, created_at, updated_at FROM tasks ",
                "WHERE lifecycle <> 'tombstoned' ",
                "AND (owner_id = $1 OR ($2::TEXT IS NOT NULL AND (",
                "metadata->'assignment'->>'assignee' = $2 ",
                "OR metadata->'assignment'->>'assignor' = $2 ",
                "OR metadata->'assignment'->'mentioned' @> jsonb_build_array($2::TEXT)))) ",
                "ORDER BY created_at, id",
            ))
            .bind::<diesel::sql_types::Uuid, _>(owner.into_inner())
            .bind::<diesel::sql_types::Nullable<diesel::sql_types::Text>, _>(handle_value);

            let rows = query.load::<TaskRow>(connection)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn list_active(&self) -> TaskStoreResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::lifecycle.ne(TOMBSTONED))
                .select(TaskRow::as_select())
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .load::<TaskRow>(connection)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }
}

fn lock_task(connection: &mut PgConnection, id: TaskId) -> TaskStoreResult<Task> {
    let row = tasks::table
        .filter(tasks::id.eq(id.into_inner()))
        .select(TaskRow::as_select())
        .for_update()
        .first::<TaskRow>(connection)
        .optional()?
        .ok_or(TaskStoreError::NotFound(id))?;
    row_to_task(row)
}

fn write_row(connection: &mut PgConnection, task: &Task) -> TaskStoreResult<()> {
    let row = to_row(task)?;
    diesel::update(tasks::table.filter(tasks::id.eq(row.id)))
        .set(&row)
        .execute(connection)
        .map_err(|err| map_write_error(err, task.id(), task.external_ref()))?;
    Ok(())
}

fn find_row_by_external_ref(
    connection: &mut PgConnection,
    reference: &ExternalRef,
) -> TaskStoreResult<Option<TaskRow>> {
    let row = tasks::table
        .filter(tasks::source.eq(reference.source().as_str()))
        .filter(tasks::external_id.eq(reference.external_id()))
        .select(TaskRow::as_select())
        .first::<TaskRow>(connection)
        .optional()?;
    Ok(row)
}

pub(super) fn to_row(task: &Task) -> TaskStoreResult<NewTaskRow> {
    let metadata = serde_json::to_value(task.metadata()).map_err(TaskStoreError::persistence)?;
    let lifecycle = task.lifecycle();
    let reference = task.external_ref();

    Ok(NewTaskRow {
        id: task.id().into_inner(),
        owner_id: task.owner_id().into_inner(),
        title: task.title().to_owned(),
        lifecycle: lifecycle.as_str().to_owned(),
        completed_at: lifecycle.completed_at(),
        tombstoned_at: lifecycle.tombstoned_at(),
        source: reference.map(|value| value.source().as_str().to_owned()),
        external_id: reference.map(|value| value.external_id().to_owned()),
        metadata,
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

pub(super) fn row_to_task(row: TaskRow) -> TaskStoreResult<Task> {
    let TaskRow {
        id,
        owner_id,
        title,
        lifecycle: persisted_lifecycle,
        completed_at,
        tombstoned_at,
        source: _,
        external_id: _,
        metadata: persisted_metadata,
        created_at,
        updated_at,
    } = row;

    let metadata = serde_json::from_value::<TaskMetadata>(persisted_metadata)
        .map_err(TaskStoreError::persistence)?;
    let lifecycle = TaskLifecycle::from_parts(&persisted_lifecycle, completed_at, tombstoned_at)
        .map_err(TaskStoreError::persistence)?;

    let data = PersistedTaskData {
        id: TaskId::from_uuid(id),
        owner_id: UserId::from_uuid(owner_id),
        title,
        metadata,
        lifecycle,
        created_at,
        updated_at,
    };
    Ok(Task::from_persisted(data))
}

fn map_write_error(
    err: DieselError,
    task_id: TaskId,
    reference: Option<&ExternalRef>,
) -> TaskStoreError {
    match (err, reference) {
        (DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info), Some(value))
            if is_external_ref_unique_violation(info.as_ref()) =>
        {
            TaskStoreError::DuplicateExternalRef(value.clone())
        }
        (DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _), _) => {
            TaskStoreError::DuplicateTask(task_id)
        }
        (other, _) => TaskStoreError::persistence(other),
    }
}

fn is_external_ref_unique_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == EXTERNAL_REF_UNIQUE_INDEX)
}
