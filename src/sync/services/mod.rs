//! Reconciliation passes and their scheduling.

mod reconcile;
mod scheduler;

pub use reconcile::{ReconciliationService, SyncError, SyncResult};
pub use scheduler::{SchedulerError, SyncEvent, SyncScheduler};
