//! Loads candidate tasks from the store and filters them for a viewer.

use crate::access::domain::{TeamRoster, Viewer, VisibilityQuery};
use crate::access::services::{AccessFilter, AccessRequest};
use crate::task::{
    domain::Task,
    ports::{TaskStore, TaskStoreResult},
};
use std::sync::Arc;
use tracing::debug;

/// Lists the tasks a viewer may see.
#[derive(Clone)]
pub struct AccessService<S>
where
    S: TaskStore,
{
    store: Arc<S>,
    filter: AccessFilter,
}

impl<S> AccessService<S>
where
    S: TaskStore,
{
    /// Creates an access service.
    #[must_use]
    pub const fn new(store: Arc<S>, filter: AccessFilter) -> Self {
        Self { store, filter }
    }

    /// Returns the visible live tasks for `viewer`, oldest first.
    ///
    /// Team views load every live task and let the team stage narrow them;
    /// other views load only tasks the viewer owns or is involved in.
    ///
    /// # Errors
    ///
    /// Returns [`crate::task::ports::TaskStoreError`] when loading
    /// candidates fails.
    pub async fn list_visible(
        &self,
        viewer: &Viewer,
        query: &VisibilityQuery,
        roster: Option<&TeamRoster>,
    ) -> TaskStoreResult<Vec<Task>> {
        let request = AccessRequest::new(viewer, query, roster);
        let candidates = if request.team_override().is_some() {
            self.store.list_active().await?
        } else {
            self.store
                .list_by_owner_or_assignment(viewer.local_id, viewer.platform_handle.as_ref())
                .await?
        };
        let loaded = candidates.len();
        let visible = self.filter.filter(&request, candidates);
        debug!(
            viewer = %viewer.local_id,
            team_view = query.team_view,
            loaded,
            visible = visible.len(),
            "filtered visible tasks"
        );
        Ok(visible)
    }
}
