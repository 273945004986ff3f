//! Tracker-to-store reconciliation.
//!
//! A [`domain::SyncScope`] names a remote result set and the local owner of
//! tasks created from it. [`services::ReconciliationService`] runs one pass
//! and returns a [`domain::SyncReport`]; [`services::SyncScheduler`] runs
//! passes periodically per scope.

pub mod domain;
pub mod services;

#[cfg(test)]
mod tests;
