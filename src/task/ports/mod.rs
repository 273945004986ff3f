//! Port contracts for task persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by task, sync and
//! access services.

pub mod store;

pub use store::{SourceListing, TaskStore, TaskStoreError, TaskStoreResult, UpsertOutcome};
