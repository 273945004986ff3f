//! Diesel row models for task persistence.

use super::schema::tasks;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for task records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Local task identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Owning local user.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub owner_id: uuid::Uuid,
    /// Task title.
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub title: String,
    /// Lifecycle state name.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub lifecycle: String,
    /// Completion timestamp.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Tombstone timestamp.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub tombstoned_at: Option<DateTime<Utc>>,
    /// Tracker source column, denormalized from the metadata link.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub source: Option<String>,
    /// External issue id column, denormalized from the metadata link.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub external_id: Option<String>,
    /// Metadata JSON document.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub metadata: Value,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last change timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert and full-replace model for task records.
#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(treat_none_as_null = true)]
pub struct NewTaskRow {
    /// Local task identifier.
    pub id: uuid::Uuid,
    /// Owning local user.
    pub owner_id: uuid::Uuid,
    /// Task title.
    pub title: String,
    /// Lifecycle state name.
    pub lifecycle: String,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Tombstone timestamp.
    pub tombstoned_at: Option<DateTime<Utc>>,
    /// Tracker source column.
    pub source: Option<String>,
    /// External issue id column.
    pub external_id: Option<String>,
    /// Metadata JSON document.
    pub metadata: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last change timestamp.
    pub updated_at: DateTime<Utc>,
}
