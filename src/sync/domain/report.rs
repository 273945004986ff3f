//! Pass settings and the per-pass report.

use crate::task::domain::Route;
use serde::{Deserialize, Serialize};

/// Tunables for a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Page size limit passed to the tracker. A result set that reaches it
    /// may be truncated.
    pub max_results: u32,
    /// Track assigned to tasks first created by a pass.
    pub tracker_route: Route,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_results: 100,
            tracker_route: Route::TrackB,
        }
    }
}

/// Counts describing one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Tasks created for remote issues seen for the first time.
    pub created: usize,
    /// Existing tasks refreshed from their remote issue, changed or not.
    pub updated: usize,
    /// Subset of `updated` whose stored fields actually changed.
    pub changed: usize,
    /// Tombstoned tasks whose issue reappeared in the scope.
    pub revived: usize,
    /// Tasks whose issue disappeared from the scope.
    pub tombstoned: usize,
    /// Tasks stripped of a malformed external link.
    pub demoted: usize,
    /// Remote issues or tombstones skipped because of an error.
    pub failed: usize,
    /// Size of the remote result set.
    pub total_remote: usize,
    /// The remote set hit the page limit, so tombstoning was skipped.
    pub truncated: bool,
}
