//! Diesel schema for task persistence.

diesel::table! {
    /// Wide task records with a structured metadata document.
    tasks (id) {
        /// Local task identifier.
        id -> Uuid,
        /// Owning local user.
        owner_id -> Uuid,
        /// Task title.
        title -> Text,
        /// Lifecycle state name.
        #[max_length = 20]
        lifecycle -> Varchar,
        /// Completion timestamp.
        completed_at -> Nullable<Timestamptz>,
        /// Tombstone timestamp.
        tombstoned_at -> Nullable<Timestamptz>,
        /// Tracker source of the external link.
        #[max_length = 32]
        source -> Nullable<Varchar>,
        /// Tracker-side issue identifier of the external link.
        #[max_length = 255]
        external_id -> Nullable<Varchar>,
        /// Structured metadata document.
        metadata -> Jsonb,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last change timestamp.
        updated_at -> Timestamptz,
    }
}
