//! Shared fixtures for `PostgreSQL` task store tests.

pub use super::cluster::{BoxError, PostgresCluster, postgres_cluster, test_runtime};
use super::cluster::TemporaryDatabase;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use taskbridge::task::adapters::postgres::{PostgresTaskStore, TaskPgPool};
use uuid::Uuid;

/// SQL creating the tasks table and its indexes.
pub const CREATE_TASKS_SQL: &str =
    include_str!("../../migrations/2026-09-01-000000_create_tasks/up.sql");

/// Template database holding the migrated schema.
pub const TEMPLATE_DB: &str = "taskbridge_test_template";

/// Ensures the template database exists with the schema applied.
///
/// # Errors
///
/// Returns an error if template creation or migration fails.
pub fn ensure_template(cluster: PostgresCluster) -> Result<(), BoxError> {
    cluster.ensure_template(TEMPLATE_DB, |url| {
        let mut connection =
            PgConnection::establish(url).map_err(|err| Box::new(err) as BoxError)?;
        connection
            .batch_execute(CREATE_TASKS_SQL)
            .map_err(|err| Box::new(err) as BoxError)
    })
}

/// A store backed by its own freshly migrated database.
pub struct PreparedStore {
    /// Store under test.
    pub store: PostgresTaskStore,
    /// Drops the database when the test ends; declared last so the pool
    /// closes first.
    pub database: TemporaryDatabase,
}

/// Creates a database from the template and a store connected to it.
///
/// # Errors
///
/// Returns an error if database creation or pool construction fails.
pub fn prepare_store(cluster: PostgresCluster) -> Result<PreparedStore, BoxError> {
    ensure_template(cluster)?;
    let database =
        cluster.temporary_database(&format!("tasks_{}", Uuid::new_v4().simple()), TEMPLATE_DB)?;
    let pool: TaskPgPool = Pool::builder()
        .max_size(2)
        .build(ConnectionManager::<PgConnection>::new(database.url()))
        .map_err(|err| Box::new(err) as BoxError)?;
    Ok(PreparedStore {
        store: PostgresTaskStore::new(pool),
        database,
    })
}
