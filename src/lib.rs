//! Taskbridge: task reconciliation between local users and issue trackers.
//!
//! Tasks live locally and may be linked to an issue in Jira, GitHub or
//! Linear. Scheduled reconciliation passes pull tracker issues into the
//! local store, and a role-aware access filter decides who sees what.
//!
//! # Architecture
//!
//! Taskbridge follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, trackers)
//!
//! # Modules
//!
//! - [`task`]: Task aggregate, persistence and local lifecycle
//! - [`tracker`]: Tracker client contract, vocabulary and write-back
//! - [`sync`]: Reconciliation passes and their scheduler
//! - [`access`]: Role, team and source based visibility
//! - [`config`]: TOML engine configuration

pub mod access;
pub mod config;
pub mod sync;
pub mod task;
pub mod tracker;
